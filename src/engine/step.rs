use crate::error::EngineError;
use crate::model::{BuildEvent, MessageLevel};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Environment variable a bound property is exported under.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, so `template.file` is `template_file`.
pub(crate) fn env_name(property: &str) -> String {
    let mut name: String = property
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Environment handed to every step: each bound property under its [`env_name`].
pub(crate) fn environment(properties: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    properties
        .iter()
        .map(|(k, v)| (env_name(k), v.clone()))
        .collect()
}

/// Rewrite `${NAME}` references to bound properties as shell expansions of their
/// environment variable.
///
/// Values never enter the command text, so the shell does not re-read them.
/// Unbound references are kept verbatim so the shell can still expand them.
pub(crate) fn substitute(template: &str, properties: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                out.push_str("${");
                if properties.contains_key(name) {
                    out.push_str(&env_name(name));
                } else {
                    out.push_str(name);
                }
                out.push('}');
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Run one shell step with `env` added to its environment, forwarding its output
/// lines as task messages.
pub(crate) async fn run_step(
    task: &str,
    command: &str,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    event_tx: &mpsc::UnboundedSender<BuildEvent>,
) -> Result<(), EngineError> {
    tracing::debug!(task, command, "running step");

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| EngineError::Spawn {
            task: task.to_string(),
            command: command.to_string(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let out_task = stdout.map(|s| forward_lines(s, task, MessageLevel::Info, event_tx.clone()));
    let err_task = stderr.map(|s| forward_lines(s, task, MessageLevel::Warn, event_tx.clone()));

    let status = child.wait().await.map_err(|source| EngineError::Spawn {
        task: task.to_string(),
        command: command.to_string(),
        source,
    })?;

    // Drain both pipes before reporting so output precedes the finish event.
    if let Some(h) = out_task {
        let _ = h.await;
    }
    if let Some(h) = err_task {
        let _ = h.await;
    }

    if status.success() {
        Ok(())
    } else {
        Err(EngineError::StepFailed {
            task: task.to_string(),
            command: command.to_string(),
            status: status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
        })
    }
}

/// Forward each output line, decoding lossily. The pipe is read to EOF so the child
/// never sees it closed early.
fn forward_lines<R>(
    reader: R,
    task: &str,
    level: MessageLevel,
    event_tx: mpsc::UnboundedSender<BuildEvent>,
) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let task = task.to_string();
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let _ = event_tx.send(BuildEvent::Message {
                        task: task.clone(),
                        level,
                        text: String::from_utf8_lossy(&buf).into_owned(),
                    });
                }
                Err(e) => {
                    tracing::debug!(task = %task, "step output unreadable, discarding the rest: {e}");
                    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bound_references_become_environment_expansions() {
        let p = props(&[("SOURCE_DIRECTORY", "/src"), ("template.file", "/t.toml")]);
        assert_eq!(
            substitute("cp -r \"${SOURCE_DIRECTORY}/a\" \"${template.file}\"", &p),
            "cp -r \"${SOURCE_DIRECTORY}/a\" \"${template_file}\""
        );
        assert_eq!(
            environment(&p),
            props(&[("SOURCE_DIRECTORY", "/src"), ("template_file", "/t.toml")])
        );
    }

    #[test]
    fn leaves_unbound_and_unterminated_references() {
        let p = props(&[]);
        assert_eq!(substitute("echo ${HOME} $1", &p), "echo ${HOME} $1");
        assert_eq!(substitute("echo ${OPEN", &p), "echo ${OPEN");
    }

    #[test]
    fn env_names_are_shell_identifiers() {
        assert_eq!(env_name("basedir"), "basedir");
        assert_eq!(env_name("a-b.c"), "a_b_c");
        assert_eq!(env_name("1st"), "_1st");
    }

    #[tokio::test]
    async fn values_with_shell_syntax_reach_the_step_literally() {
        let dir = tempfile::tempdir().unwrap();
        let value = "gen$HOME `id` \"q\" \\ end";
        let p = props(&[("VALUE", value)]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let command = substitute("printf '%s\\n' \"${VALUE}\"", &p);
        run_step("t", &command, dir.path(), &environment(&p), &tx)
            .await
            .unwrap();
        drop(tx);

        let mut texts = Vec::new();
        while let Some(ev) = rx.recv().await {
            if let BuildEvent::Message { text, .. } = ev {
                texts.push(text);
            }
        }
        assert_eq!(texts, vec![value.to_string()]);
    }

    #[tokio::test]
    async fn invalid_utf8_output_is_decoded_and_fully_drained() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let command = "printf 'bad \\377\\n'; i=0; while [ $i -lt 50000 ]; do echo line; i=$((i+1)); done";
        run_step("t", command, dir.path(), &BTreeMap::new(), &tx)
            .await
            .unwrap();
        drop(tx);

        let mut texts = Vec::new();
        while let Some(ev) = rx.recv().await {
            if let BuildEvent::Message { text, .. } = ev {
                texts.push(text);
            }
        }
        assert_eq!(texts.len(), 50001);
        assert_eq!(texts[0], "bad \u{FFFD}");
        assert_eq!(texts[50000], "line");
    }

    #[tokio::test]
    async fn streams_output_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        run_step("t", "echo hello; echo oops >&2", dir.path(), &BTreeMap::new(), &tx)
            .await
            .unwrap();
        let err = run_step("t", "exit 3", dir.path(), &BTreeMap::new(), &tx).await.unwrap_err();
        drop(tx);

        let mut messages = Vec::new();
        while let Some(ev) = rx.recv().await {
            if let BuildEvent::Message { level, text, .. } = ev {
                messages.push((level, text));
            }
        }
        assert!(messages.contains(&(MessageLevel::Info, "hello".to_string())));
        assert!(messages.contains(&(MessageLevel::Warn, "oops".to_string())));
        match err {
            EngineError::StepFailed { status, .. } => assert_eq!(status, "3"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
