use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::NoiseConfig;
use crate::SynthError;

/// Zero-mean Gaussian sources, one per noisy term of the step recurrence.
#[derive(Debug, Clone)]
pub struct NoiseBank {
    current: Normal<f64>,
    temperature: Normal<f64>,
    rf_output: Normal<f64>,
    drift: Normal<f64>,
    freq_internal: Normal<f64>,
    freq_external: Normal<f64>,
    aclr: Normal<f64>,
    evm: Normal<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseTerm {
    Current,
    Temperature,
    RfOutput,
    Drift,
    FreqInternal,
    FreqExternal,
    Aclr,
    Evm,
}

impl NoiseBank {
    pub fn new(config: &NoiseConfig) -> Result<Self, SynthError> {
        Ok(Self {
            current: gaussian("current", config.current_a)?,
            temperature: gaussian("temperature", config.temperature_c)?,
            rf_output: gaussian("rf_output", config.rf_output_dbm)?,
            drift: gaussian("drift", config.drift_hz)?,
            freq_internal: gaussian("freq_internal", config.freq_internal_hz)?,
            freq_external: gaussian("freq_external", config.freq_external_hz)?,
            aclr: gaussian("aclr", config.aclr_db)?,
            evm: gaussian("evm", config.evm_percent)?,
        })
    }

    pub fn draw<R: Rng + ?Sized>(&self, term: NoiseTerm, rng: &mut R) -> f64 {
        let dist = match term {
            NoiseTerm::Current => &self.current,
            NoiseTerm::Temperature => &self.temperature,
            NoiseTerm::RfOutput => &self.rf_output,
            NoiseTerm::Drift => &self.drift,
            NoiseTerm::FreqInternal => &self.freq_internal,
            NoiseTerm::FreqExternal => &self.freq_external,
            NoiseTerm::Aclr => &self.aclr,
            NoiseTerm::Evm => &self.evm,
        };
        dist.sample(rng)
    }
}

fn gaussian(name: &str, sigma: f64) -> Result<Normal<f64>, SynthError> {
    Normal::new(0.0, sigma)
        .map_err(|err| SynthError::RandomSource(format!("{name} noise (sigma {sigma}): {err}")))
}
