//! Repair prompt wording

const TESTBENCH_REPAIR: &str = "The Verilog testbench below fails to compile or run. Fix it using the error message that follows it.
Keep every part of the testbench that is unrelated to the error exactly as it is, and reply with the complete corrected testbench.
Each line of the testbench starts with its line number, and the error message refers to those numbers. The numbers are only there to help you locate the error; do not include them in your reply.
The testbench has to keep writing the observed signals to TBout.txt.";

const TESTBENCH_FORMAT: &str =
    "Reply with the corrected Verilog code only, inside a single block that starts with ```verilog and ends with ```.";

const CHECKER_REPAIR: &str = "The Python checker below raised an error. Fix it using the error message that follows it.
Keep every part of the code that is unrelated to the error exactly as it is, and reply with the complete corrected code.
Each line of the code starts with its line number, and the error message refers to those numbers. The numbers are only there to help you locate the error; do not include them in your reply.";

const CHECKER_FORMAT: &str =
    "Reply with the corrected Python code only, inside a single block that starts with ```python and ends with ```.";

/// Prompt asking for a fixed testbench
pub fn testbench_repair(marked_code: &str, diagnostic: &str) -> String {
    format!(
        "{}\n\nTestbench with the error:\n{}\n\nError message:\n{}\n\n{}",
        TESTBENCH_REPAIR, marked_code, diagnostic, TESTBENCH_FORMAT
    )
}

/// Prompt asking for a fixed checker script
pub fn checker_repair(marked_code: &str, diagnostic: &str) -> String {
    format!(
        "{}\n\nPython code with the error:\n{}\n\nError message:\n{}\n\n{}",
        CHECKER_REPAIR, marked_code, diagnostic, CHECKER_FORMAT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_carry_code_and_error() {
        let prompt = testbench_repair("1. module tb;", "tb.v:1: syntax error");
        assert!(prompt.contains("1. module tb;"));
        assert!(prompt.contains("tb.v:1: syntax error"));
        assert!(prompt.ends_with("```verilog and ends with ```."));

        let prompt = checker_repair("1. x = ", "SyntaxError");
        assert!(prompt.contains("```python"));
        assert!(prompt.contains("SyntaxError"));
    }
}
