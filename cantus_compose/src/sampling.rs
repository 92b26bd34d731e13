// Weighted and distribution-shaped selection on top of the raw engines.
//
// All helpers walk cumulative weights against one uniform draw, so the
// number of engine calls per selection is constant regardless of outcome —
// this keeps generation reproducible across configurations that only differ
// in weights.

use cantus_prng::RandomEngine;

/// Pick a uniformly random element of a nonempty slice.
pub fn pick_uniform<'a, T>(engine: &mut dyn RandomEngine, items: &'a [T]) -> &'a T {
    assert!(!items.is_empty(), "cannot pick from an empty slice");
    let idx = engine.uniform(0, items.len() as i64) as usize;
    &items[idx]
}

/// Pick an index into `items`, weighting each element by `weight`.
///
/// Weights need not be normalized. Non-positive total weight falls back to
/// the last index, mirroring the behaviour of the transition-row sampler:
/// the caller configured a degenerate distribution, not the sampler.
pub fn pick_weighted<T>(
    engine: &mut dyn RandomEngine,
    items: &[T],
    weight: impl Fn(&T) -> f64,
) -> usize {
    assert!(!items.is_empty(), "cannot pick from an empty slice");
    let total: f64 = items.iter().map(&weight).sum();
    if total <= 0.0 {
        return items.len() - 1;
    }
    let target = engine.next_f64() * total;
    let mut cumulative = 0.0;
    for (i, item) in items.iter().enumerate() {
        cumulative += weight(item);
        if cumulative > target {
            return i;
        }
    }
    items.len() - 1
}

/// Standard normal probability density.
fn normal_pdf(x: f64) -> f64 {
    (-x * x / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Pick an index in `0..len`, weighted by the standard normal density over a
/// mapped domain.
///
/// With `fixed_domain` false, indices are spread evenly across `[low, high]`
/// (default ±3), so the bell always covers the whole container. With
/// `fixed_domain` true the per-index step is held at `(high - low) / 6`
/// around the container's midpoint regardless of its width; wide containers
/// then get genuinely negligible tails instead of a rescaled bell.
pub fn gaussian_index(
    engine: &mut dyn RandomEngine,
    len: usize,
    low: f64,
    high: f64,
    fixed_domain: bool,
) -> usize {
    assert!(len > 0, "cannot pick from an empty container");
    assert!(low < high, "gaussian domain must be ordered");
    if len == 1 {
        return 0;
    }
    let map = |i: usize| -> f64 {
        if fixed_domain {
            let mid = (len - 1) as f64 / 2.0;
            (i as f64 - mid) * (high - low) / 6.0
        } else {
            low + (high - low) * i as f64 / (len - 1) as f64
        }
    };
    let indices: Vec<usize> = (0..len).collect();
    pick_weighted(engine, &indices, |&i| normal_pdf(map(i)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cantus_prng::engine_by_name;

    #[test]
    fn pick_uniform_covers_all_elements() {
        let mut engine = engine_by_name("xoshiro256++", 1).unwrap();
        let items = [1, 2, 3, 4];
        let mut seen = [false; 4];
        for _ in 0..1000 {
            seen[*pick_uniform(engine.as_mut(), &items) as usize - 1] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn pick_weighted_respects_weights() {
        let mut engine = engine_by_name("xoshiro256++", 2).unwrap();
        let items = ["never", "always"];
        for _ in 0..1000 {
            let idx = pick_weighted(engine.as_mut(), &items, |&s| {
                if s == "always" { 1.0 } else { 0.0 }
            });
            assert_eq!(idx, 1);
        }
    }

    #[test]
    fn pick_weighted_zero_total_falls_back_to_last() {
        let mut engine = engine_by_name("xoshiro256++", 3).unwrap();
        let items = [1, 2, 3];
        assert_eq!(pick_weighted(engine.as_mut(), &items, |_| 0.0), 2);
    }

    #[test]
    fn pick_weighted_is_roughly_proportional() {
        let mut engine = engine_by_name("xoshiro256++", 4).unwrap();
        let items = [1.0f64, 3.0];
        let mut counts = [0u32; 2];
        let n = 20_000;
        for _ in 0..n {
            counts[pick_weighted(engine.as_mut(), &items, |&w| w)] += 1;
        }
        let share = counts[1] as f64 / n as f64;
        assert!(
            (0.70..0.80).contains(&share),
            "3:1 weighting should land near 75%, got {share:.3}"
        );
    }

    #[test]
    fn gaussian_favors_the_middle() {
        let mut engine = engine_by_name("xoshiro256++", 5).unwrap();
        let len = 9;
        let mut counts = vec![0u32; len];
        for _ in 0..20_000 {
            counts[gaussian_index(engine.as_mut(), len, -3.0, 3.0, false)] += 1;
        }
        let mid = counts[len / 2];
        assert!(mid > counts[0] * 4, "centre should dominate the tails");
        assert!(mid > counts[len - 1] * 4);
    }

    #[test]
    fn gaussian_single_element_is_trivial() {
        let mut engine = engine_by_name("xoshiro256++", 6).unwrap();
        assert_eq!(gaussian_index(engine.as_mut(), 1, -3.0, 3.0, true), 0);
    }

    #[test]
    fn fixed_domain_damps_wide_containers_harder() {
        let mut engine = engine_by_name("xoshiro256++", 7).unwrap();
        // 25 indices at unit steps reach ±12 in the fixed domain; the outer
        // indices should be practically unreachable.
        let len = 25;
        let mut extremes = 0u32;
        let n = 20_000;
        for _ in 0..n {
            let idx = gaussian_index(engine.as_mut(), len, -3.0, 3.0, true);
            if idx < 6 || idx > 18 {
                extremes += 1;
            }
        }
        assert!(
            (extremes as f64) < n as f64 * 0.01,
            "indices beyond 6 deviations should be vanishing, got {extremes}"
        );
    }
}
