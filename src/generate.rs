//! Generation stage.
//!
//! `Generator` produces the first testbench and checker for a task and returns
//! them in a typed [`GeneratedArtifacts`]. `RegenerationSource` is what the
//! debug loop calls to reboot one backend's artifact from scratch.
//!
//! [`LlmGenerator`] implements both with a short staged workflow: analyse the
//! problem, write the testbench, write the checker's golden model. Every
//! stage's prompt and reply is saved in the directory it ran for.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;

use crate::checker::Backend;
use crate::domain::Task;
use crate::error::{Result, TbloopError};
use crate::llm::{CompletionRequest, LlmClient, extract_last_code};
use crate::usage::UsageScope;
use crate::workspace::format_transcript;

/// Fixed driver appended to every generated golden model. It starts with the
/// marker the focused repair splits on.
///
/// Mismatches are only printed: the testbench drives an empty DUT stub, so
/// its outputs never match the model. The script fails only when it raises.
pub const CHECKER_SCAFFOLD: &str = r#"def check_dut(vectors_in):
    golden_dut = GoldenDUT()
    failed_scenarios = []
    for vector in vectors_in:
        if golden_dut.check(vector):
            print(f"Passed; vector: {vector}")
        else:
            print(f"Failed; vector: {vector}")
            failed_scenarios.append(vector["scenario"])
    return failed_scenarios

def SignalTxt_to_dictlist(txt: str):
    signals = []
    for line in txt.strip().split("\n"):
        signal = {}
        for item in line.strip().split(", "):
            if "scenario" in item:
                signal["scenario"] = item.split(": ")[1]
            else:
                key, value = item.split(" = ")
                signal[key] = value if ("x" in value or "z" in value) else int(value)
        signals.append(signal)
    return signals

with open("TBout.txt", "r") as f:
    vectors_in = SignalTxt_to_dictlist(f.read())
failed = check_dut(vectors_in)
print(failed)
"#;

/// Typed output of the generation stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedArtifacts {
    pub testbench: String,
    /// Behavioral checker, when checking is enabled
    pub checker: Option<String>,
    /// Whether the checker carries the fixed scaffold focused repair relies on
    pub checker_focus: bool,
    /// `CMB` or `SEQ` as judged by the analysis stage
    pub circuit_type: Option<String>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, work_dir: &Path) -> Result<GeneratedArtifacts>;
}

/// Regenerates one backend's artifact without touching the other one
#[async_trait]
pub trait RegenerationSource: Send + Sync {
    async fn reboot(&self, work_dir: &Path, backend: Backend) -> Result<String>;
}

#[derive(Debug, Default, Deserialize)]
struct Analysis {
    #[serde(default)]
    circuit_type: Option<String>,
}

/// Generator driven by an LLM client
pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
    usage: Arc<UsageScope>,
    task: Task,
    with_checker: bool,
    max_tokens: u32,
    temperature: Option<f32>,
    /// Analysis reply reused by reboots
    analysis: Mutex<Option<String>>,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LlmClient>, usage: Arc<UsageScope>, task: Task) -> Self {
        Self {
            client,
            usage,
            task,
            with_checker: true,
            max_tokens: 8192,
            temperature: None,
            analysis: Mutex::new(None),
        }
    }

    pub fn with_checker(mut self, enabled: bool) -> Self {
        self.with_checker = enabled;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    async fn ask(&self, work_dir: &Path, stage: &str, prompt: String) -> Result<String> {
        let request = CompletionRequest::default()
            .with_user_message(prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let response = self.client.complete(request.clone()).await?;
        self.usage.record(&response.model, &response.usage)?;

        tokio::fs::create_dir_all(work_dir).await?;
        let transcript = format_transcript(&response.transcript(&request));
        tokio::fs::write(work_dir.join(format!("{}_messages.txt", stage)), transcript).await?;
        log::debug!("[{}] stage {} answered by {}", self.task.task_id, stage, response.model);

        Ok(response.content)
    }

    fn problem(&self) -> String {
        format!(
            "Problem description:\n{}\n\nDUT header:\n{}",
            self.task.description, self.task.header
        )
    }

    async fn analysis(&self, work_dir: &Path) -> Result<String> {
        let cached = self
            .analysis
            .lock()
            .map_err(|e| TbloopError::Regeneration(e.to_string()))?
            .clone();
        if let Some(analysis) = cached {
            return Ok(analysis);
        }

        let prompt = format!(
            "You are planning a Verilog testbench for the circuit described below.\n\n{}\n\n\
             Decide whether the circuit is combinational (CMB) or sequential (SEQ) and list the test scenarios \
             that together cover every requirement of the description. Reply in JSON, for example:\n\
             ```json\n{{\"circuit_type\": \"CMB\", \"scenarios\": [\"all inputs zero\", \"select toggles\"]}}\n```",
            self.problem()
        );
        let reply = self.ask(work_dir, "analysis", prompt).await?;
        if let Ok(mut slot) = self.analysis.lock() {
            *slot = Some(reply.clone());
        }
        Ok(reply)
    }

    async fn testbench(&self, work_dir: &Path, analysis: &str) -> Result<String> {
        let prompt = format!(
            "Write a Verilog testbench for the device under test below.\n\n{}\n\nTest plan:\n{}\n\n\
             Instantiate the DUT and drive every scenario of the plan. After each scenario has settled, append one \
             line to TBout.txt with $fdisplay in the form `scenario: <n>, <signal> = <value>, ...` listing every \
             input and output of the DUT in decimal. Do not check the outputs in the testbench. \
             Reply with the complete testbench inside a ```verilog block.",
            self.problem(),
            analysis
        );
        let reply = self.ask(work_dir, "testbench", prompt).await?;
        non_empty(extract_last_code(&reply, Backend::Primary.language()), "testbench")
    }

    async fn checker(&self, work_dir: &Path, analysis: &str) -> Result<String> {
        let prompt = format!(
            "Write a Python golden model of the circuit below.\n\n{}\n\nTest plan:\n{}\n\n\
             Define `class GoldenDUT` with `__init__(self)`, `load(self, signal_vector)` that computes the expected \
             outputs from the inputs in the dict `signal_vector` (updating internal state for sequential circuits), \
             and `check(self, signal_vector)` that returns True when the outputs in `signal_vector` match. \
             Signal values are Python ints. Only write the class; the driver that reads the trace is provided. \
             Reply inside a ```python block.",
            self.problem(),
            analysis
        );
        let reply = self.ask(work_dir, "checker", prompt).await?;
        let golden = non_empty(extract_last_code(&reply, Backend::Secondary.language()), "checker")?;
        Ok(format!("{}\n\n{}", golden.trim_end(), CHECKER_SCAFFOLD))
    }
}

fn non_empty(code: String, what: &str) -> Result<String> {
    if code.trim().is_empty() {
        Err(TbloopError::Regeneration(format!("model returned an empty {}", what)))
    } else {
        Ok(code)
    }
}

/// Circuit type from the analysis reply, if it can be read
fn circuit_type(analysis: &str) -> Option<String> {
    let json = extract_last_code(analysis, "json");
    match serde_json::from_str::<Analysis>(json.trim()) {
        Ok(parsed) => parsed.circuit_type,
        Err(e) => {
            log::warn!("Could not parse analysis reply: {}", e);
            ["SEQ", "CMB"].iter().find(|t| analysis.contains(*t)).map(|t| t.to_string())
        }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, work_dir: &Path) -> Result<GeneratedArtifacts> {
        if let Ok(mut slot) = self.analysis.lock() {
            *slot = None;
        }
        let analysis = self.analysis(work_dir).await?;
        let testbench = self.testbench(work_dir, &analysis).await?;
        let checker = if self.with_checker {
            Some(self.checker(work_dir, &analysis).await?)
        } else {
            None
        };

        Ok(GeneratedArtifacts {
            testbench,
            checker_focus: checker.is_some(),
            checker,
            circuit_type: circuit_type(&analysis),
        })
    }
}

#[async_trait]
impl RegenerationSource for LlmGenerator {
    async fn reboot(&self, work_dir: &Path, backend: Backend) -> Result<String> {
        let analysis = self.analysis(work_dir).await?;
        log::info!("[{}] regenerating {} artifact", self.task.task_id, backend);
        match backend {
            Backend::Primary => self.testbench(work_dir, &analysis).await,
            Backend::Secondary => self.checker(work_dir, &analysis).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{ArtifactRunner, PythonRunner, RunRequest};
    use crate::debug::FocusSplit;
    use crate::llm::MockLlmClient;
    use tempfile::TempDir;

    fn task() -> Task {
        Task::new("mux", "A 2-to-1 multiplexer", "module top_module(input a, b, sel, output out);")
    }

    const ANALYSIS: &str = "```json\n{\"circuit_type\": \"CMB\", \"scenarios\": [\"sel low\"]}\n```";
    const TB: &str = "```verilog\nmodule tb; endmodule\n```";
    const GOLDEN: &str = "```python\nclass GoldenDUT:\n    pass\n```";

    #[tokio::test]
    async fn test_generate_all_stages() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockLlmClient::new(vec![ANALYSIS, TB, GOLDEN]));
        let scope = UsageScope::detached();
        let generator = LlmGenerator::new(client.clone(), scope.clone(), task());

        let artifacts = generator.generate(temp.path()).await.unwrap();

        assert_eq!(artifacts.testbench, "module tb; endmodule\n");
        assert_eq!(artifacts.circuit_type.as_deref(), Some("CMB"));
        assert!(artifacts.checker_focus);
        let checker = artifacts.checker.unwrap();
        assert!(checker.starts_with("class GoldenDUT:"));
        assert_eq!(FocusSplit::split(&checker).scaffold, CHECKER_SCAFFOLD);
        assert_eq!(scope.totals().prompt_tokens, 300);
        assert!(temp.path().join("analysis_messages.txt").exists());
        assert!(temp.path().join("checker_messages.txt").exists());
        assert!(client.requests()[1].messages[0].content.contains("top_module"));
    }

    #[tokio::test]
    async fn test_generate_without_checker() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockLlmClient::new(vec![ANALYSIS, TB]));
        let generator = LlmGenerator::new(client, UsageScope::detached(), task()).with_checker(false);

        let artifacts = generator.generate(temp.path()).await.unwrap();
        assert!(artifacts.checker.is_none());
        assert!(!artifacts.checker_focus);
    }

    #[tokio::test]
    async fn test_reboot_reuses_analysis() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockLlmClient::new(vec![
            ANALYSIS,
            TB,
            GOLDEN,
            "```verilog\nmodule tb2; endmodule\n```",
        ]));
        let generator = LlmGenerator::new(client.clone(), UsageScope::detached(), task());
        generator.generate(temp.path()).await.unwrap();

        let reboot_dir = temp.path().join("debug_3_reboot");
        let tb = generator.reboot(&reboot_dir, Backend::Primary).await.unwrap();

        assert_eq!(tb, "module tb2; endmodule\n");
        assert_eq!(client.requests().len(), 4);
        assert!(reboot_dir.join("testbench_messages.txt").exists());
    }

    const MUX_MODEL: &str = "class GoldenDUT:\n    def __init__(self):\n        self.out = 0\n\n    def load(self, signal_vector):\n        self.out = signal_vector[\"b\"] if signal_vector[\"sel\"] else signal_vector[\"a\"]\n\n    def check(self, signal_vector):\n        self.load(signal_vector)\n        return signal_vector[\"out\"] == self.out\n";

    const STUB_TRACE: &str = "scenario: 1, a = 0, b = 1, sel = 1, out = z\nscenario: 2, a = 1, b = 0, sel = 0, out = z\n";

    fn checker_request(dir: &Path, source: String) -> RunRequest {
        RunRequest {
            task_id: "mux".to_string(),
            source,
            work_dir: dir.to_path_buf(),
            input: Some(STUB_TRACE.to_string()),
            timeout: std::time::Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_correct_model_passes_against_stub_trace() {
        let temp = TempDir::new().unwrap();
        let source = format!("{}\n\n{}", MUX_MODEL, CHECKER_SCAFFOLD);

        let result = PythonRunner::default().run(checker_request(temp.path(), source)).await.unwrap();

        assert!(result.passed(), "{:?}", result);
        assert!(result.stdout.contains("Failed; vector"));
    }

    #[tokio::test]
    async fn test_broken_model_fails() {
        let temp = TempDir::new().unwrap();
        let broken = MUX_MODEL.replace("signal_vector[\"sel\"]", "signal_vector[\"select\"]");
        let source = format!("{}\n\n{}", broken, CHECKER_SCAFFOLD);

        let result = PythonRunner::default().run(checker_request(temp.path(), source)).await.unwrap();

        assert!(!result.passed());
        assert!(result.diagnostic.contains("KeyError"));
    }

    #[test]
    fn test_circuit_type_fallback() {
        assert_eq!(circuit_type("it is SEQ, clearly").as_deref(), Some("SEQ"));
        assert_eq!(circuit_type("no idea"), None);
    }
}
