// Instruments: a name, a MIDI channel/program pair, and an optional
// unpitched sound index for percussion.
//
// Programs and unpitched indices are stored 1-based, notation style; the
// MIDI writer subtracts one. An instrument with a nonzero unpitched index is
// a percussion instrument.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    name: String,
    channel: u8,
    program: u8,
    unpitched: u8,
}

impl Instrument {
    pub fn new(name: impl Into<String>, channel: u8, program: u8, unpitched: u8) -> Self {
        assert!(channel < 16, "channel {channel} out of range");
        Instrument {
            name: name.into(),
            channel,
            program,
            unpitched,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn set_channel(&mut self, channel: u8) {
        assert!(channel < 16, "channel {channel} out of range");
        self.channel = channel;
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    pub fn set_program(&mut self, program: u8) {
        self.program = program;
    }

    /// 1-based percussion sound index; 0 for pitched instruments.
    pub fn unpitched(&self) -> u8 {
        self.unpitched
    }

    pub fn set_unpitched(&mut self, unpitched: u8) {
        self.unpitched = unpitched;
    }

    pub fn is_percussion(&self) -> bool {
        self.unpitched > 0
    }

    /// Look up a built-in instrument by its catalog name.
    ///
    /// Configurations may define further instruments; this table covers the
    /// common General MIDI voices used by the shipped example configs.
    pub fn standard(name: &str) -> Option<Instrument> {
        let (program, unpitched) = match name {
            "acoustic-grand-piano" => (1, 0),
            "bright-acoustic-piano" => (2, 0),
            "church-organ" => (20, 0),
            "acoustic-guitar-nylon" => (25, 0),
            "violin" => (41, 0),
            "viola" => (42, 0),
            "cello" => (43, 0),
            "contrabass" => (44, 0),
            "trumpet" => (57, 0),
            "french-horn" => (61, 0),
            "clarinet" => (72, 0),
            "flute" => (74, 0),
            "choir-aahs" => (53, 0),
            // Percussion: program 1 on the drum channel, sound = key + 1.
            "bass-drum" => (1, 37),
            "acoustic-snare" => (1, 39),
            "hand-clap" => (1, 40),
            "tambourine" => (1, 55),
            "hi-wood-block" => (1, 77),
            "low-wood-block" => (1, 78),
            _ => return None,
        };
        Some(Instrument::new(name, 0, program, unpitched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitched_versus_percussion() {
        let piano = Instrument::standard("acoustic-grand-piano").unwrap();
        assert!(!piano.is_percussion());
        let block = Instrument::standard("hi-wood-block").unwrap();
        assert!(block.is_percussion());
        assert_eq!(block.unpitched(), 77);
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(Instrument::standard("theremin").is_none());
    }

    #[test]
    #[should_panic]
    fn channel_out_of_range_is_fatal() {
        Instrument::new("x", 16, 1, 0);
    }
}
