pub mod automation;
pub mod command;
pub mod headless;
pub mod library;

use std::path::Path;

use crate::config::ConverterConfig;
use crate::error::ConvertError;

pub use automation::OfficeAutomation;
pub use headless::HeadlessSuite;
pub use library::DocxRenderer;

/// One way of turning an office document into a PDF.
pub trait ConversionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Writes the PDF rendition of `source` to `dest`.
    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConvertError>;
}

/// Which strategy produced the PDF, and what failed before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub strategy: &'static str,
    pub attempts: Vec<String>,
}

/// Tries its strategies in order until one produces the destination file.
pub struct DocumentConverter {
    strategies: Vec<Box<dyn ConversionStrategy>>,
}

impl DocumentConverter {
    pub fn new(strategies: Vec<Box<dyn ConversionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Native automation, then a headless suite, then the built-in renderer,
    /// each as enabled in `config`.
    pub fn from_config(config: &ConverterConfig) -> Self {
        let mut strategies: Vec<Box<dyn ConversionStrategy>> = Vec::new();
        if config.office_automation {
            strategies.push(Box::new(OfficeAutomation::new(config.timeout())));
        }
        strategies.push(Box::new(HeadlessSuite::new(
            config.candidates.clone(),
            config.timeout(),
        )));
        if config.library_fallback {
            strategies.push(Box::new(DocxRenderer::new()));
        }
        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn convert(&self, source: &Path, dest: &Path) -> Result<Conversion, ConvertError> {
        let _span = tracing::info_span!(
            "convert",
            source = %crate::sanitize::redact_path(source)
        )
        .entered();

        if !source.is_file() {
            return Err(ConvertError::SourceMissing(source.to_path_buf()));
        }
        if self.strategies.is_empty() {
            return Err(ConvertError::Exhausted {
                attempts: "no strategies configured".to_string(),
            });
        }

        let mut attempts = Vec::new();
        for strategy in &self.strategies {
            let outcome = strategy.convert(source, dest).and_then(|()| {
                if dest.is_file() {
                    Ok(())
                } else {
                    Err(ConvertError::MissingOutput(dest.to_path_buf()))
                }
            });

            match outcome {
                Ok(()) => {
                    log::info!("Converted document with {}", strategy.name());
                    return Ok(Conversion {
                        strategy: strategy.name(),
                        attempts,
                    });
                }
                Err(ConvertError::Unavailable) => {
                    log::debug!("{} is unavailable on this host", strategy.name());
                    attempts.push(format!("{}: {}", strategy.name(), ConvertError::Unavailable));
                }
                Err(e) => {
                    log::warn!("{} failed: {}", strategy.name(), e);
                    attempts.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        Err(ConvertError::Exhausted {
            attempts: attempts.join("; "),
        })
    }
}
