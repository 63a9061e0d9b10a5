//! Conversions backed by external command line tools. Every run gets its own
//! scratch directory which is removed when the run ends.

pub mod runner;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rupa_core::config::ToolPaths;
use rupa_core::error::{RupaError, RupaResult};
use rupa_core::transform::{Action, TransformOutput, Transformer};
use uuid::Uuid;

use runner::{action_invocation, merge_invocation, run_tool};

const MERGED_NAME: &str = "merged.pdf";

pub struct ExternalTransformer {
    tools: ToolPaths,
    work_dir: PathBuf,
}

impl ExternalTransformer {
    pub fn new(tools: ToolPaths, work_dir: PathBuf) -> Self {
        Self { tools, work_dir }
    }

    async fn scratch_dir(&self) -> RupaResult<PathBuf> {
        let dir = self.work_dir.join(Uuid::new_v4().simple().to_string());
        tokio::fs::create_dir_all(dir.join("in")).await?;
        Ok(dir)
    }

    async fn convert(
        &self,
        dir: &Path,
        action: Action,
        file_name: &str,
        input: Vec<u8>,
    ) -> RupaResult<TransformOutput> {
        let input_path = dir.join("in").join(sanitize(file_name));
        tokio::fs::write(&input_path, input).await?;
        let output_path = dir.join(action.output_name());

        let invocation = action_invocation(&self.tools, action, &input_path, &output_path);
        run_tool(&invocation).await?;

        Ok(TransformOutput {
            file_name: action.output_name().to_string(),
            bytes: read_output(&invocation.program, &output_path).await?,
        })
    }

    async fn merge(&self, dir: &Path, inputs: Vec<Vec<u8>>) -> RupaResult<Vec<u8>> {
        let mut paths = Vec::with_capacity(inputs.len());
        for (i, bytes) in inputs.into_iter().enumerate() {
            let path = dir.join("in").join(format!("part_{i:02}.pdf"));
            tokio::fs::write(&path, bytes).await?;
            paths.push(path);
        }
        let output_path = dir.join(MERGED_NAME);

        let invocation = merge_invocation(&self.tools, &paths, &output_path);
        run_tool(&invocation).await?;
        read_output(&invocation.program, &output_path).await
    }
}

#[async_trait]
impl Transformer for ExternalTransformer {
    async fn apply(
        &self,
        action: Action,
        file_name: &str,
        input: Vec<u8>,
    ) -> RupaResult<TransformOutput> {
        let dir = self.scratch_dir().await?;
        let result = self.convert(&dir, action, file_name, input).await;
        remove_scratch(&dir).await;
        result
    }

    async fn merge_documents(&self, inputs: Vec<Vec<u8>>) -> RupaResult<Vec<u8>> {
        let dir = self.scratch_dir().await?;
        let result = self.merge(&dir, inputs).await;
        remove_scratch(&dir).await;
        result
    }
}

async fn read_output(program: &str, path: &Path) -> RupaResult<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        Ok(_) => Err(RupaError::TransformFailed(format!("{} produced an empty file", program))),
        Err(e) => Err(RupaError::TransformFailed(format!(
            "{} produced no output: {}",
            program, e
        ))),
    }
}

async fn remove_scratch(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        log::warn!("Failed to remove scratch dir {}: {}", dir.display(), e);
    }
}

/// File name safe to hand to a tool: no separators, no leading dash.
fn sanitize(name: &str) -> String {
    let clean: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let clean = clean.trim_start_matches(['.', '-']);
    if clean.is_empty() {
        "file".to_string()
    } else {
        format!("src_{clean}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("../../etc/passwd"), "src_etc_passwd");
        assert_eq!(sanitize("-rf.pdf"), "src_rf.pdf");
        assert_eq!(sanitize("my report.pdf"), "src_my_report.pdf");
        assert_eq!(sanitize("..."), "file");
    }

    #[tokio::test]
    async fn test_failed_run_cleans_scratch_dir() {
        let temp = TempDir::new().unwrap();
        let tools = ToolPaths {
            magick: "rupa-no-such-magick".into(),
            ghostscript: "rupa-no-such-gs".into(),
            ffmpeg: "rupa-no-such-ffmpeg".into(),
            zip: "rupa-no-such-zip".into(),
            qpdf: "rupa-no-such-qpdf".into(),
        };
        let transformer = ExternalTransformer::new(tools, temp.path().to_path_buf());

        let err = transformer
            .apply(Action::ToJpg, "cat.png", b"png".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, RupaError::TransformFailed(_)));
        let err = transformer
            .merge_documents(vec![b"a".to_vec(), b"b".to_vec()])
            .await
            .unwrap_err();
        assert!(matches!(err, RupaError::TransformFailed(_)));

        let leftovers = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
