//! idsearcher agent: scans the primary code input for SPDX short-form
//! license identifiers and writes an SPDX document.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use peridot_core::job::PRIMARY_SOURCE;
use peridot_core::JobConfig;

use crate::error::PayloadError;
use crate::payload::Payload;

pub mod spdx;

pub use spdx::{DocumentBuilder, IdSearcher, SearchSettings, SpdxDocument, SpdxError};

/// Name of the SPDX package describing the primary input.
pub const PACKAGE_NAME: &str = "primary";

/// File name of the document written to the SPDX output directory.
pub const OUTPUT_FILE: &str = "primary.spdx";

/// What an idsearcher job scans and where it writes the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub root: PathBuf,
    pub output_file: PathBuf,
}

#[derive(Clone)]
pub struct IdSearcherPayload {
    builder: Arc<dyn DocumentBuilder>,
    settings: SearchSettings,
}

impl IdSearcherPayload {
    pub fn new(settings: SearchSettings) -> Self {
        Self::with_builder(Arc::new(IdSearcher), settings)
    }

    /// Use a different document builder.
    pub fn with_builder(builder: Arc<dyn DocumentBuilder>, settings: SearchSettings) -> Self {
        Self { builder, settings }
    }
}

impl Default for IdSearcherPayload {
    fn default() -> Self {
        Self::new(SearchSettings::default())
    }
}

#[async_trait]
impl Payload for IdSearcherPayload {
    type Plan = SearchPlan;

    fn agent_type(&self) -> &'static str {
        "idsearcher"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["codereader".to_string(), "spdxwriter".to_string()]
    }

    fn validate(&self, config: &JobConfig) -> Result<SearchPlan, PayloadError> {
        // Only the first path of the last primary input is scanned, but every
        // primary input must carry at least one path.
        let mut root: &str = "";
        for input in config.code_inputs.iter().filter(|c| c.source == PRIMARY_SOURCE) {
            root = input.paths.first().map(String::as_str).ok_or_else(|| {
                PayloadError::Config("no codeInput paths specified for primary source".to_string())
            })?;
        }
        if root.is_empty() {
            return Err(PayloadError::Config(
                "no primary codeInputs specified".to_string(),
            ));
        }

        if config.spdx_output_dir.is_empty() {
            return Err(PayloadError::Config(
                "no spdxOutputDir specified".to_string(),
            ));
        }

        Ok(SearchPlan {
            root: PathBuf::from(root),
            output_file: Path::new(&config.spdx_output_dir).join(OUTPUT_FILE),
        })
    }

    async fn execute(
        &self,
        plan: SearchPlan,
        cancel: CancellationToken,
    ) -> Result<String, PayloadError> {
        info!(root = %plan.root.display(), "Searching for license identifiers");

        let builder = Arc::clone(&self.builder);
        let settings = self.settings.clone();
        let root = plan.root.clone();
        let build = tokio::task::spawn_blocking(move || {
            builder.build(PACKAGE_NAME, &root, &settings)
        });

        // A build already on the blocking pool runs to completion; its
        // result is discarded once the job is cancelled.
        let document = tokio::select! {
            _ = cancel.cancelled() => return Err(PayloadError::Cancelled),
            joined = build => joined
                .map_err(|e| PayloadError::Collaborator(format!("idsearcher failed: {}", e)))?
                .map_err(|e| PayloadError::Collaborator(format!("idsearcher failed: {}", e)))?,
        };

        if cancel.is_cancelled() {
            return Err(PayloadError::Cancelled);
        }

        let output_file = plan.output_file.clone();
        tokio::task::spawn_blocking(move || save_document(&document, &output_file))
            .await
            .map_err(|e| {
                PayloadError::Collaborator(format!("can't write SPDX document to disk: {}", e))
            })??;

        info!(path = %plan.output_file.display(), "Wrote SPDX document");
        Ok(String::new())
    }
}

fn save_document(document: &SpdxDocument, path: &Path) -> Result<(), PayloadError> {
    let file = File::create(path).map_err(|e| {
        PayloadError::Collaborator(format!(
            "can't open file to write SPDX document to disk: {}",
            e
        ))
    })?;
    document
        .save_tag_value(BufWriter::new(file))
        .map_err(|e| PayloadError::Collaborator(format!("can't write SPDX document to disk: {}", e)))
}
