//! Focused repair of checker scripts.
//!
//! Generated checkers end in a fixed scaffold (the comparison driver and the
//! trace parser). Only the part before it is sent for repair, and the
//! scaffold is glued back on afterwards so the model cannot alter it.

const DRIVER_MARKER: &str = "def check_dut(vectors_in):\n    golden_dut = GoldenDUT()\n    failed_scenarios = []";
const PARSER_MARKER: &str = "\ndef SignalTxt_to_dictlist";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusSplit {
    /// Portion sent for repair
    pub core: String,
    /// Portion that is kept verbatim
    pub scaffold: String,
}

impl FocusSplit {
    pub fn split(code: &str) -> Self {
        let marker = if code.contains(DRIVER_MARKER) {
            DRIVER_MARKER
        } else {
            PARSER_MARKER
        };
        match code.find(marker) {
            Some(at) => Self {
                core: code[..at].to_string(),
                scaffold: code[at..].to_string(),
            },
            None => Self {
                core: code.to_string(),
                scaffold: String::new(),
            },
        }
    }

    /// Whole split: every repair that is not focused
    pub fn unfocused(code: &str) -> Self {
        Self {
            core: code.to_string(),
            scaffold: String::new(),
        }
    }

    pub fn reassemble(&self, repaired_core: &str) -> String {
        format!("{}{}", repaired_core, self.scaffold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKER: &str = "class GoldenDUT:\n    def load(self, s):\n        pass\n\ndef check_dut(vectors_in):\n    golden_dut = GoldenDUT()\n    failed_scenarios = []\n    return failed_scenarios\n\ndef SignalTxt_to_dictlist(txt):\n    return []\n";

    #[test]
    fn test_split_on_driver() {
        let split = FocusSplit::split(CHECKER);
        assert_eq!(split.core, "class GoldenDUT:\n    def load(self, s):\n        pass\n\n");
        assert!(split.scaffold.starts_with("def check_dut(vectors_in):"));
        assert_eq!(split.reassemble(&split.core), CHECKER);
    }

    #[test]
    fn test_split_on_parser() {
        let code = "def golden(a):\n    return a\n\ndef SignalTxt_to_dictlist(txt):\n    return []\n";
        let split = FocusSplit::split(code);
        assert_eq!(split.core, "def golden(a):\n    return a\n");
        assert!(split.scaffold.starts_with("\ndef SignalTxt_to_dictlist"));
        assert_eq!(split.reassemble("def golden(a):\n    return not a\n"), "def golden(a):\n    return not a\n\ndef SignalTxt_to_dictlist(txt):\n    return []\n");
    }

    #[test]
    fn test_no_marker_is_whole_text() {
        let split = FocusSplit::split("print('hi')\n");
        assert_eq!(split, FocusSplit::unfocused("print('hi')\n"));
        assert_eq!(split.reassemble("print('bye')\n"), "print('bye')\n");
    }
}
