//! Digest registry: maps algorithm names to digest constructors.
//!
//! The table is fixed at construction time. Lookups are exact and
//! case-sensitive, and the first registered entry is the default algorithm.

use crate::error::EngineError;
use sha2::Digest;

/// Incremental digest computation.
///
/// `finalize` is a separate, consuming step: algorithms that pad or mix a final
/// block do so there, even when the last `update` received no bytes.
pub trait ChecksumHasher: Send {
    /// Feed more input into the digest
    fn update(&mut self, data: &[u8]);

    /// Finish the computation and return the raw digest bytes
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// Adapter for every RustCrypto hasher (`sha1`, `sha2`).
struct DigestHasher<D> {
    inner: D,
}

impl<D: Digest + Send> ChecksumHasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.inner.finalize().to_vec()
    }
}

/// MD5 hasher (backed by md5 crate)
struct Md5Hasher {
    context: md5::Context,
}

impl ChecksumHasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.context.compute().0.to_vec()
    }
}

/// BLAKE3 hasher (backed by blake3 crate)
struct Blake3Hasher {
    hasher: blake3::Hasher,
}

impl ChecksumHasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.hasher.finalize().as_bytes().to_vec()
    }
}

fn digest<D: Digest + Send + 'static>() -> Box<dyn ChecksumHasher> {
    Box::new(DigestHasher { inner: D::new() })
}

fn md5_hasher() -> Box<dyn ChecksumHasher> {
    Box::new(Md5Hasher {
        context: md5::Context::new(),
    })
}

fn blake3_hasher() -> Box<dyn ChecksumHasher> {
    Box::new(Blake3Hasher {
        hasher: blake3::Hasher::new(),
    })
}

/// One registered algorithm.
#[derive(Debug, Clone, Copy)]
pub struct AlgorithmEntry {
    name: &'static str,
    output_len: usize,
    constructor: fn() -> Box<dyn ChecksumHasher>,
}

impl AlgorithmEntry {
    /// Registered name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        self.output_len
    }
}

const BUILTIN: &[AlgorithmEntry] = &[
    AlgorithmEntry {
        name: "SHA-1",
        output_len: 20,
        constructor: digest::<sha1::Sha1>,
    },
    AlgorithmEntry {
        name: "SHA-256",
        output_len: 32,
        constructor: digest::<sha2::Sha256>,
    },
    AlgorithmEntry {
        name: "SHA-384",
        output_len: 48,
        constructor: digest::<sha2::Sha384>,
    },
    AlgorithmEntry {
        name: "SHA-512",
        output_len: 64,
        constructor: digest::<sha2::Sha512>,
    },
    AlgorithmEntry {
        name: "MD5",
        output_len: 16,
        constructor: md5_hasher,
    },
    AlgorithmEntry {
        name: "BLAKE3",
        output_len: 32,
        constructor: blake3_hasher,
    },
];

/// Fixed table of supported digest algorithms.
#[derive(Debug, Clone, Copy)]
pub struct DigestRegistry {
    entries: &'static [AlgorithmEntry],
}

impl DigestRegistry {
    /// Registry holding every built-in algorithm, `SHA-1` first.
    pub fn builtin() -> Self {
        DigestRegistry {
            entries: BUILTIN,
        }
    }

    /// Supported algorithm names, in registration order.
    pub fn supported_algorithms(&self) -> impl Iterator<Item = &'static str> {
        let entries: &'static [AlgorithmEntry] = self.entries;
        entries.iter().map(|entry| entry.name)
    }

    /// The first registered algorithm.
    pub fn default_algorithm(&self) -> &'static str {
        self.entries[0].name
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn entry(&self, name: &str) -> Option<&'static AlgorithmEntry> {
        let entries: &'static [AlgorithmEntry] = self.entries;
        entries.iter().find(|entry| entry.name == name)
    }

    /// Create a fresh digest instance for `name`.
    pub fn new_digest(&self, name: &str) -> Result<Box<dyn ChecksumHasher>, EngineError> {
        self.entry(name)
            .map(|entry| (entry.constructor)())
            .ok_or_else(|| EngineError::UnknownAlgorithm {
                name: name.to_string(),
            })
    }
}

impl Default for DigestRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
