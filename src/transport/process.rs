use std::time::Duration;

use serde::Deserialize;

use super::{RawBatch, Transport};
use crate::config::TransportConfig;
use crate::model::{Conversation, EntryId};
use crate::subprocess::{RunOutput, Tool};

/// Transport backed by an external driver program.
///
/// Each operation is one invocation: `<program> <args..> <verb> <operands..>`.
/// The driver answers with JSON on stdout. A non-zero exit on `select`,
/// `participants` or `send` means the driver could not reach the conversation.
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GroupResponse {
    group: bool,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    unseen: usize,
}

impl ProcessTransport {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            program: config.program.clone(),
            base_args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn tool(&self, verb: &str) -> Tool {
        Tool::new(&self.program)
            .args(self.base_args.as_slice())
            .arg(verb)
            .timeout(self.timeout)
    }

    fn query<T: serde::de::DeserializeOwned>(&self, tool: &Tool) -> anyhow::Result<T> {
        tool.run_ok()?.parse_json()
    }

    /// Runs a navigation-style verb: a failed exit is an answer, not an error.
    fn attempt(&self, tool: &Tool) -> anyhow::Result<Option<RunOutput>> {
        let output = tool.run()?;
        if output.success() {
            Ok(Some(output))
        } else {
            tracing::debug!(
                program = %self.program,
                code = output.exit_code,
                stderr = %output.stderr.trim(),
                "driver declined request"
            );
            Ok(None)
        }
    }
}

impl Transport for ProcessTransport {
    fn list_conversations(&mut self) -> anyhow::Result<Vec<Conversation>> {
        self.query(&self.tool("conversations"))
    }

    fn participants(&mut self, conversation_id: &str) -> anyhow::Result<Vec<String>> {
        match self.attempt(&self.tool("participants").arg(conversation_id))? {
            Some(output) => output.parse_json(),
            None => Ok(Vec::new()),
        }
    }

    fn select_conversation(&mut self, conversation_id: &str) -> anyhow::Result<bool> {
        Ok(self
            .attempt(&self.tool("select").arg(conversation_id))?
            .is_some())
    }

    fn is_group_conversation(&mut self) -> anyhow::Result<bool> {
        let response: GroupResponse = self.query(&self.tool("is-group"))?;
        Ok(response.group)
    }

    fn unseen_count(&mut self) -> anyhow::Result<usize> {
        let response: CountResponse = self.query(&self.tool("unseen-count"))?;
        Ok(response.unseen)
    }

    fn fetch_raw_entries(&mut self, only_unseen: bool) -> anyhow::Result<Vec<RawBatch>> {
        let mut tool = self.tool("fetch");
        if only_unseen {
            tool = tool.arg("--unseen");
        }
        self.query(&tool)
    }

    fn mark_seen(&mut self, entries: &[EntryId]) -> anyhow::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let ids: Vec<&str> = entries.iter().map(EntryId::as_str).collect();
        self.tool("mark-seen").args(ids.as_slice()).run_ok()?;
        Ok(())
    }

    fn evict_oldest(&mut self, keep_count: usize) -> anyhow::Result<()> {
        let keep = keep_count.to_string();
        self.tool("evict").args(&["--keep", keep.as_str()]).run_ok()?;
        Ok(())
    }

    fn send_text(&mut self, conversation_id: &str, text: &str) -> anyhow::Result<bool> {
        Ok(self
            .attempt(&self.tool("send").args(&[conversation_id, text]))?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExitError;

    fn transport(program: &str, args: &[&str]) -> ProcessTransport {
        ProcessTransport::new(&TransportConfig {
            program: program.into(),
            args: args.iter().map(ToString::to_string).collect(),
            timeout_secs: 5,
        })
    }

    #[test]
    fn missing_driver_is_reported() {
        let mut t = transport("nonexistent-driver-xyz", &[]);
        let err = t.list_conversations().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExitError>(),
            Some(ExitError::TransportNotFound { .. })
        ));
    }

    #[test]
    fn declined_navigation_is_not_an_error() {
        // `false` ignores its arguments and exits 1.
        let mut t = transport("false", &[]);
        assert!(!t.select_conversation("42").unwrap());
        assert!(t.participants("42").unwrap().is_empty());
        assert!(!t.send_text("42", "hi").unwrap());
    }

    #[test]
    fn json_answers_are_decoded() {
        // `sh -c <script> <argv0> <verb> ..` prints a canned reply per verb.
        let script = r#"case "$1" in
            conversations) echo '[{"name":"Ann","id":"7"}]' ;;
            participants) echo '["Ann","Bot"]' ;;
            is-group) echo '{"group":true}' ;;
            unseen-count) echo '{"unseen":3}' ;;
            fetch) echo '[{"id":"b1","author":{"kind":"self_authored"},"entries":[{"id":"e1","text":"hey"}]}]' ;;
            *) exit 0 ;;
        esac"#;
        let mut t = transport("sh", &["-c", script, "driver"]);

        let conversations = t.list_conversations().unwrap();
        assert_eq!(conversations[0].id, "7");
        assert_eq!(t.participants("7").unwrap(), vec!["Ann", "Bot"]);
        assert!(t.select_conversation("7").unwrap());
        assert!(t.is_group_conversation().unwrap());
        assert_eq!(t.unseen_count().unwrap(), 3);

        let batches = t.fetch_raw_entries(true).unwrap();
        assert_eq!(batches[0].entries[0].primary_text(), Some("hey"));

        t.mark_seen(&[EntryId::new("e1")]).unwrap();
        t.evict_oldest(30).unwrap();
    }
}
