use std::sync::Arc;

use tiktoken_rs::CoreBPE;
use tokio::sync::RwLock;

use crate::error::{Result, TokenizerError};

/// The two BPE encodings this gateway ever needs. `o200k_base` covers the
/// `gpt-4o`/`chatgpt`/`o1`/`o3` family; everything else — including any
/// model name the registry has never heard of — falls back to `cl100k_base`
/// so a novel upstream model name never breaks cost estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    O200kBase,
    Cl100kBase,
}

/// Longest-prefix-wins selection. `gpt-4o` must be tested before the
/// shorter `gpt-4` would otherwise (falsely) match first — there is no
/// `gpt-4` entry here, so the ordering only matters within the o200k set.
pub fn encoding_for_model(model: &str) -> Encoding {
    const O200K_PREFIXES: &[&str] = &["gpt-4o", "chatgpt", "o1", "o3"];
    if O200K_PREFIXES.iter().any(|p| model.starts_with(p)) {
        Encoding::O200kBase
    } else {
        Encoding::Cl100kBase
    }
}

/// Lazily materializes and caches each encoding behind a reader/writer
/// guard — most calls hit the read path once both encodings are warm.
#[derive(Default)]
pub struct EncodingRegistry {
    o200k: RwLock<Option<Arc<CoreBPE>>>,
    cl100k: RwLock<Option<Arc<CoreBPE>>>,
}

impl EncodingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, encoding: Encoding) -> Result<Arc<CoreBPE>> {
        match encoding {
            Encoding::O200kBase => self.get_or_init(&self.o200k, "o200k_base", tiktoken_rs::o200k_base).await,
            Encoding::Cl100kBase => self.get_or_init(&self.cl100k, "cl100k_base", tiktoken_rs::cl100k_base).await,
        }
    }

    async fn get_or_init(
        &self,
        slot: &RwLock<Option<Arc<CoreBPE>>>,
        name: &'static str,
        build: impl FnOnce() -> anyhow::Result<CoreBPE>,
    ) -> Result<Arc<CoreBPE>> {
        if let Some(bpe) = slot.read().await.as_ref() {
            return Ok(bpe.clone());
        }
        let mut guard = slot.write().await;
        if let Some(bpe) = guard.as_ref() {
            return Ok(bpe.clone());
        }
        let bpe = Arc::new(build().map_err(|e| TokenizerError::EncodingLoad(name, e.to_string()))?);
        *guard = Some(bpe.clone());
        Ok(bpe)
    }

    pub async fn encode(&self, text: &str, model: &str) -> Result<Vec<u32>> {
        let bpe = self.get(encoding_for_model(model)).await?;
        Ok(bpe.encode_with_special_tokens(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_selection() {
        assert_eq!(encoding_for_model("gpt-4o-mini"), Encoding::O200kBase);
        assert_eq!(encoding_for_model("chatgpt-4o-latest"), Encoding::O200kBase);
        assert_eq!(encoding_for_model("o1-preview"), Encoding::O200kBase);
        assert_eq!(encoding_for_model("o3-mini"), Encoding::O200kBase);
        assert_eq!(encoding_for_model("gpt-4"), Encoding::Cl100kBase);
        assert_eq!(encoding_for_model("gpt-3.5-turbo"), Encoding::Cl100kBase);
        assert_eq!(encoding_for_model("some-unreleased-model"), Encoding::Cl100kBase);
    }

    #[tokio::test]
    async fn encodings_are_cached_across_calls() {
        let registry = EncodingRegistry::new();
        let a = registry.get(Encoding::Cl100kBase).await.unwrap();
        let b = registry.get(Encoding::Cl100kBase).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
