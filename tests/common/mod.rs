//! Shared test infrastructure for integration tests.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// An isolated pforge invocation backed by the mock LM script.
pub struct TestFixture {
    pub fixture_dir: PathBuf,
    pub temp: TempDir,
    envs: Vec<(String, String)>,
}

impl TestFixture {
    /// Load a fixture by name from tests/fixtures/{name}/.
    pub fn load(name: &str) -> Self {
        let fixture_dir = manifest_dir()
            .join("tests/fixtures")
            .join(name)
            .canonicalize()
            .expect("fixture dir exists");
        let temp = TempDir::new().expect("create temp dir");
        Self {
            fixture_dir,
            temp,
            envs: Vec::new(),
        }
    }

    /// Make the mock LM fail the first `count` calls for `schema`.
    pub fn fail_schema(mut self, schema: &str, count: u32, message: &str) -> Self {
        self.envs
            .push(("PFORGE_MOCK_FAIL_SCHEMA".into(), schema.into()));
        self.envs
            .push(("PFORGE_MOCK_FAIL_COUNT".into(), count.to_string()));
        self.envs
            .push(("PFORGE_MOCK_FAIL_MESSAGE".into(), message.into()));
        self
    }

    pub fn input_path(&self) -> PathBuf {
        self.fixture_dir.join("product.json")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.temp.path().join("output")
    }

    /// Write `contents` to a file inside the temp dir and return its path.
    pub fn write_temp(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(&path, contents).expect("write temp file");
        path
    }

    fn lm_command(&self) -> String {
        let script = manifest_dir().join("tests/mock-lm.sh");
        shell_quote_pair(&script, &self.fixture_dir)
    }

    /// Run pforge with `args`, isolated from the caller's config and env.
    pub fn pforge(&self, args: &[&str]) -> Output {
        let state_dir = self.temp.path().join("mock-state");
        std::fs::create_dir_all(&state_dir).expect("create mock state dir");
        let home = self.temp.path().join("home");
        std::fs::create_dir_all(&home).expect("create home dir");

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pforge"));
        cmd.args(args)
            .current_dir(self.temp.path())
            .env("HOME", &home)
            .env("XDG_CONFIG_HOME", home.join(".config"))
            .env("PFORGE_LM_COMMAND", self.lm_command())
            .env("PFORGE_MOCK_STATE_DIR", &state_dir)
            .env("PFORGE_RETRY_DELAY_MS", "0")
            .env_remove("PFORGE_BACKEND")
            .env_remove("PFORGE_INPUT")
            .env_remove("PFORGE_OUTPUT_DIR")
            .env_remove("OPENAI_API_KEY")
            .env_remove("RUST_LOG");
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.output().expect("run pforge")
    }
}

fn shell_quote_pair(script: &Path, fixture: &Path) -> String {
    format!(
        "sh '{}' '{}'",
        script.display().to_string().replace('\'', r"'\''"),
        fixture.display().to_string().replace('\'', r"'\''")
    )
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("read {}: {err}", path.display()));
    serde_json::from_str(&text).unwrap_or_else(|err| panic!("parse {}: {err}", path.display()))
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
