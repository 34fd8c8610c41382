//! Randomness sources.
//!
//! RULE: Strategies and the drum never touch a platform RNG directly.
//! Every draw pulls its floats through one `RandomSource`, resolved per
//! generation call by `resolve_source`.
//!
//! Four tiers share the same async contract:
//!   - pseudorandom: PCG stream, seedable for reproducible runs.
//!   - secure:       OS entropy, u32 / 2^32.
//!   - verifiable:   SHA-256(seed ‖ counter), first 4 bytes / 2^32.
//!   - external:     Mulberry32 seeded from a fetched block hash.
//!
//! Degradation is external → secure → pseudorandom. It is logged, never
//! surfaced to the caller.

use crate::config::EntropyConfig;
use crate::error::{DrawError, DrawResultOf};
use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const TWO_POW_32: f64 = 4_294_967_296.0;

/// Uniform floats in [0, 1), one await per sample.
#[async_trait]
pub trait RandomSource: Send {
    fn kind(&self) -> RngType;

    async fn next_f64(&mut self) -> f64;
}

/// Map a sample onto an index in [0, len). `len` must be > 0.
pub async fn next_index(rng: &mut dyn RandomSource, len: usize) -> usize {
    debug_assert!(len > 0, "len must be > 0");
    let r = rng.next_f64().await;
    ((r * len as f64) as usize).min(len - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RngType {
    Pseudorandom,
    Secure,
    Verifiable,
    External,
}

impl RngType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pseudorandom => "pseudorandom",
            Self::Secure       => "secure",
            Self::Verifiable   => "verifiable",
            Self::External     => "external",
        }
    }
}

impl fmt::Display for RngType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RngType {
    type Err = DrawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pseudorandom" | "prng"      => Ok(Self::Pseudorandom),
            "secure"                     => Ok(Self::Secure),
            "verifiable" | "vrf"         => Ok(Self::Verifiable),
            "external" | "blockchain"    => Ok(Self::External),
            other => Err(DrawError::Config(format!("unknown rng type '{other}'"))),
        }
    }
}

// ── Pseudorandom ──────────────────────────────────────────────────

/// Non-cryptographic PCG stream.
pub struct PseudoRandomSource {
    inner: Pcg64Mcg,
}

impl PseudoRandomSource {
    pub fn from_entropy() -> Self {
        Self { inner: Pcg64Mcg::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    /// Independent stream `index` under a master seed. Consecutive draws of
    /// a seeded session each get their own stream.
    pub fn for_stream(master_seed: u64, index: u64) -> Self {
        Self::seeded(master_seed ^ index.wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }

    fn sample(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

#[async_trait]
impl RandomSource for PseudoRandomSource {
    fn kind(&self) -> RngType { RngType::Pseudorandom }

    async fn next_f64(&mut self) -> f64 {
        self.sample()
    }
}

// ── Secure ────────────────────────────────────────────────────────

/// OS entropy pool. If the platform source errors, the remainder of the
/// session runs on a time-seeded PCG stream.
pub struct SecureRandomSource {
    degraded: Option<PseudoRandomSource>,
}

impl SecureRandomSource {
    pub fn new() -> Self {
        Self { degraded: None }
    }
}

impl Default for SecureRandomSource {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl RandomSource for SecureRandomSource {
    fn kind(&self) -> RngType { RngType::Secure }

    async fn next_f64(&mut self) -> f64 {
        if let Some(fallback) = self.degraded.as_mut() {
            return fallback.sample();
        }
        let mut buf = [0u8; 4];
        match OsRng.try_fill_bytes(&mut buf) {
            Ok(()) => u32::from_be_bytes(buf) as f64 / TWO_POW_32,
            Err(e) => {
                log::warn!("Secure RNG failed, falling back to pseudorandom: {e}");
                let seed = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
                let mut fallback = PseudoRandomSource::seeded(seed);
                let r = fallback.sample();
                self.degraded = Some(fallback);
                r
            }
        }
    }
}

// ── Verifiable (simulated VRF) ────────────────────────────────────

/// Hash(seed ‖ counter). Fully determined by the seed, so two sources with
/// the same seed replay the same stream.
pub struct VerifiableRandomSource {
    seed:    String,
    counter: u64,
}

impl VerifiableRandomSource {
    /// Seed from the current time in milliseconds.
    pub fn new() -> Self {
        Self::with_seed(chrono::Utc::now().timestamp_millis() as u64)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed: seed.to_string(), counter: 0 }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl Default for VerifiableRandomSource {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl RandomSource for VerifiableRandomSource {
    fn kind(&self) -> RngType { RngType::Verifiable }

    async fn next_f64(&mut self) -> f64 {
        self.counter += 1;
        let digest = Sha256::digest(format!("{}{}", self.seed, self.counter).as_bytes());
        let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        value as f64 / TWO_POW_32
    }
}

// ── External entropy (block-hash seeded) ──────────────────────────

/// Supplies a fresh external hash string, e.g. the latest block hash.
#[async_trait]
pub trait EntropyBeacon: Send + Sync {
    async fn latest_hash(&self) -> anyhow::Result<String>;
}

/// Fetches the hash as a plain-text body over HTTP.
pub struct HttpBeacon {
    client: reqwest::Client,
    url:    String,
}

impl HttpBeacon {
    pub fn new(config: &EntropyConfig) -> DrawResultOf<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.beacon_timeout_secs))
            .build()
            .map_err(anyhow::Error::from)?;
        Ok(Self { client, url: config.beacon_url.clone() })
    }
}

#[async_trait]
impl EntropyBeacon for HttpBeacon {
    async fn latest_hash(&self) -> anyhow::Result<String> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

/// Mulberry32 driven by a 32-bit seed folded from the beacon hash.
pub struct ExternalEntropySource {
    state: u32,
}

impl ExternalEntropySource {
    /// Fetch once; every later sample is local.
    pub async fn connect(beacon: &dyn EntropyBeacon) -> DrawResultOf<Self> {
        let unavailable = |reason: String| DrawError::EntropySourceUnavailable {
            source_name: "external",
            reason,
        };
        let hash = beacon.latest_hash().await.map_err(|e| unavailable(e.to_string()))?;
        let hash = hash.trim();
        if hash.is_empty() {
            return Err(unavailable("beacon returned an empty hash".into()));
        }
        log::info!("Using external block hash: {hash}");
        Ok(Self::from_hash(hash))
    }

    pub fn from_hash(hash: &str) -> Self {
        Self { state: fold_hash(hash) }
    }

    fn mulberry32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }
}

#[async_trait]
impl RandomSource for ExternalEntropySource {
    fn kind(&self) -> RngType { RngType::External }

    async fn next_f64(&mut self) -> f64 {
        self.mulberry32() as f64 / TWO_POW_32
    }
}

/// Rolling `h = h * 31 + c` over UTF-16 code units, 32-bit wrapping.
fn fold_hash(hash: &str) -> u32 {
    hash.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32)) as u32
}

// ── Resolution ────────────────────────────────────────────────────

/// Build the source for one generation call.
///
/// `stream` selects the pseudorandom stream when a master seed is
/// configured, so consecutive calls stay reproducible but distinct.
pub async fn resolve_source(
    rng_type: RngType,
    config: &EntropyConfig,
    beacon: Option<&dyn EntropyBeacon>,
    stream: u64,
) -> Box<dyn RandomSource> {
    match rng_type {
        RngType::Pseudorandom => Box::new(pseudorandom(config, stream)),
        RngType::Secure => Box::new(SecureRandomSource::new()),
        RngType::Verifiable => match config.verifiable_seed {
            Some(seed) => Box::new(VerifiableRandomSource::with_seed(seed)),
            None => Box::new(VerifiableRandomSource::new()),
        },
        RngType::External => {
            let Some(beacon) = beacon else {
                log::warn!("No entropy beacon configured, falling back to secure RNG");
                return Box::new(SecureRandomSource::new());
            };
            match ExternalEntropySource::connect(beacon).await {
                Ok(source) => Box::new(source),
                Err(e) => {
                    log::warn!("{e}; falling back to secure RNG");
                    Box::new(SecureRandomSource::new())
                }
            }
        }
    }
}

pub fn pseudorandom(config: &EntropyConfig, stream: u64) -> PseudoRandomSource {
    match config.pseudorandom_seed {
        Some(seed) => PseudoRandomSource::for_stream(seed, stream),
        None => PseudoRandomSource::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DownBeacon;

    #[async_trait]
    impl EntropyBeacon for DownBeacon {
        async fn latest_hash(&self) -> anyhow::Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    struct FixedBeacon(&'static str);

    #[async_trait]
    impl EntropyBeacon for FixedBeacon {
        async fn latest_hash(&self) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    async fn samples(rng: &mut dyn RandomSource, n: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(rng.next_f64().await);
        }
        out
    }

    #[tokio::test]
    async fn every_tier_stays_in_unit_interval() {
        let mut sources: Vec<Box<dyn RandomSource>> = vec![
            Box::new(PseudoRandomSource::seeded(7)),
            Box::new(SecureRandomSource::new()),
            Box::new(VerifiableRandomSource::with_seed(7)),
            Box::new(ExternalEntropySource::from_hash("00000000000000000002a7c4c1e48d76")),
        ];
        for source in sources.iter_mut() {
            for r in samples(source.as_mut(), 500).await {
                assert!((0.0..1.0).contains(&r), "{} produced {r}", source.kind());
            }
        }
    }

    #[tokio::test]
    async fn verifiable_replays_for_same_seed() {
        let mut a = VerifiableRandomSource::with_seed(1_700_000_000_000);
        let mut b = VerifiableRandomSource::with_seed(1_700_000_000_000);
        assert_eq!(samples(&mut a, 20).await, samples(&mut b, 20).await);
        assert_eq!(a.counter(), 20);
    }

    #[tokio::test]
    async fn verifiable_matches_manual_digest() {
        let mut rng = VerifiableRandomSource::with_seed(42);
        let first = rng.next_f64().await;
        let digest = Sha256::digest(b"421");
        let expected =
            u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as f64 / TWO_POW_32;
        assert_eq!(first, expected);
    }

    #[test]
    fn fold_hash_matches_rolling_multiply_add() {
        assert_eq!(fold_hash(""), 0);
        assert_eq!(fold_hash("a"), 97);
        assert_eq!(fold_hash("ab"), 97 * 31 + 98);
    }

    #[tokio::test]
    async fn mulberry32_first_output_for_zero_seed() {
        // Reference value of mulberry32(0) for the first call.
        let mut rng = ExternalEntropySource { state: 0 };
        assert_eq!(rng.mulberry32(), 1_144_304_738);
    }

    #[tokio::test]
    async fn external_falls_back_to_secure_when_beacon_is_down() {
        let config = EntropyConfig::default();
        let source = resolve_source(RngType::External, &config, Some(&DownBeacon), 0).await;
        assert_eq!(source.kind(), RngType::Secure);

        let source = resolve_source(RngType::External, &config, None, 0).await;
        assert_eq!(source.kind(), RngType::Secure);
    }

    #[tokio::test]
    async fn external_uses_beacon_hash() {
        let config = EntropyConfig::default();
        let mut source =
            resolve_source(RngType::External, &config, Some(&FixedBeacon("abc123\n")), 0).await;
        assert_eq!(source.kind(), RngType::External);
        let mut direct = ExternalEntropySource::from_hash("abc123");
        assert_eq!(source.next_f64().await, direct.next_f64().await);
    }

    #[tokio::test]
    async fn seeded_streams_are_reproducible_and_distinct() {
        let config = EntropyConfig { pseudorandom_seed: Some(99), ..EntropyConfig::default() };
        let mut a = pseudorandom(&config, 1);
        let mut b = pseudorandom(&config, 1);
        let mut c = pseudorandom(&config, 2);
        let sa = samples(&mut a, 10).await;
        assert_eq!(sa, samples(&mut b, 10).await);
        assert_ne!(sa, samples(&mut c, 10).await);
    }

    #[test]
    fn parses_legacy_rng_names() {
        assert_eq!("prng".parse::<RngType>().unwrap(), RngType::Pseudorandom);
        assert_eq!("vrf".parse::<RngType>().unwrap(), RngType::Verifiable);
        assert_eq!("blockchain".parse::<RngType>().unwrap(), RngType::External);
        assert!("dice".parse::<RngType>().is_err());
    }
}
