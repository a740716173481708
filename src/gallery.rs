use std::path::Path;

use anyhow::Context;

/// Known faces: `encodings[i]` belongs to `names[i]`.
#[derive(Debug, Clone, PartialEq, bitcode::Encode, bitcode::Decode)]
pub struct Gallery {
    encodings: Vec<Vec<f32>>,
    names: Vec<String>,
}

impl Gallery {
    pub fn new(encodings: Vec<Vec<f32>>, names: Vec<String>) -> anyhow::Result<Self> {
        let gallery = Gallery { encodings, names };
        gallery.validate()?;
        Ok(gallery)
    }

    #[tracing::instrument]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).context(format!("could not read gallery {}", path.display()))?;
        let gallery = Self::from_bytes(&bytes)?;
        if gallery.is_empty() {
            tracing::warn!(path = %path.display(), "gallery holds no known faces");
        }
        tracing::info!(faces = gallery.len(), "loaded known faces");
        Ok(gallery)
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let gallery: Gallery = bitcode::decode(bytes).context("gallery is not a valid encoding file")?;
        gallery.validate()?;
        Ok(gallery)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bitcode::encode(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.encodings.len() != self.names.len() {
            anyhow::bail!(
                "gallery has {} encodings but {} names",
                self.encodings.len(),
                self.names.len()
            );
        }
        if let Some(first) = self.encodings.first() {
            if first.is_empty() {
                anyhow::bail!("gallery encodings are empty");
            }
            if let Some(idx) = self.encodings.iter().position(|e| e.len() != first.len()) {
                anyhow::bail!(
                    "gallery encoding {idx} has dimension {}, expected {}",
                    self.encodings[idx].len(),
                    first.len()
                );
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn encodings(&self) -> &[Vec<f32>] {
        &self.encodings
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }
}
