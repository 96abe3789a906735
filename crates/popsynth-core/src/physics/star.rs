//! Single-star evolution.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use serde::{Deserialize, Serialize};

use super::{EvolutionContext, EvolutionLimits, Notification, StellarType, SwitchEvent};
use crate::domain::{ConstructionError, KickParameters, ObjectError};
use crate::logging::{LogFile, LogRecord};
use crate::options::SOLAR_METALLICITY;

/// Dispersion of the natal kick magnitude distribution, km/s.
pub const KICK_SIGMA: f64 = 265.0;

/// Solar radius in AU.
pub const RSUN_AU: f64 = 0.004_650_47;

const NS_REFERENCE_MASS: f64 = 1.4;

// Phase boundaries as multiples of the main sequence lifetime.
const HG_END: f64 = 1.02;
const FGB_END: f64 = 1.06;
const CHEB_END: f64 = 1.09;
const EAGB_END: f64 = 1.10;

/// Highest initial mass that reaches the early AGB.
const EAGB_MAX_MASS: f64 = 8.0;

/// Main sequence lifetime in Myr.
pub fn main_sequence_lifetime(mass: f64, metallicity: f64) -> f64 {
    let z_factor = (metallicity / SOLAR_METALLICITY).powf(0.05);
    (10_000.0 * mass.powf(-2.5) * z_factor).max(3.0)
}

/// Remnant left by a star of the given initial mass.
pub fn remnant_type(initial_mass: f64) -> StellarType {
    if initial_mass < 0.5 {
        StellarType::HeliumWhiteDwarf
    } else if initial_mass < 6.0 {
        StellarType::CarbonOxygenWhiteDwarf
    } else if initial_mass < 8.0 {
        StellarType::OxygenNeonWhiteDwarf
    } else if initial_mass < 20.0 {
        StellarType::NeutronStar
    } else {
        StellarType::BlackHole
    }
}

fn remnant_mass(remnant: StellarType, initial_mass: f64, metallicity: f64) -> f64 {
    match remnant {
        StellarType::HeliumWhiteDwarf => initial_mass.min(0.45),
        StellarType::CarbonOxygenWhiteDwarf => (0.5 + 0.1 * initial_mass).min(1.1),
        StellarType::OxygenNeonWhiteDwarf => 1.25,
        StellarType::NeutronStar => 1.2 + 0.02 * (initial_mass - 8.0).max(0.0),
        StellarType::BlackHole => {
            0.4 * initial_mass * (SOLAR_METALLICITY / metallicity).powf(0.1).min(1.5)
        }
        _ => 0.0,
    }
}

/// How a single-star evolution ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StarStatus {
    Remnant,
    TimeExceeded,
    TimestepsExceeded,
}

impl StarStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StarStatus::Remnant => "Remnant formed",
            StarStatus::TimeExceeded => "Allowed time exceeded",
            StarStatus::TimestepsExceeded => "Allowed timesteps exceeded",
        }
    }
}

/// Final state of a single star.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StarOutcome {
    pub object_id: u64,
    pub seed: u64,
    pub initial_mass: f64,
    pub mass: f64,
    pub metallicity: f64,
    pub initial_type: StellarType,
    pub stellar_type: StellarType,
    /// Age at the end of evolution, Myr.
    pub age: f64,
    /// Natal kick in km/s, if the star exploded.
    pub natal_kick: Option<f64>,
    pub status: StarStatus,
    pub timesteps: u64,
}

impl StarOutcome {
    /// System-parameters row for this star.
    pub fn record(&self, index: usize) -> LogRecord {
        LogRecord::new()
            .field("Index", index as u64)
            .field("SEED", self.seed)
            .field("Mass@ZAMS", self.initial_mass)
            .field("Mass", self.mass)
            .field("Metallicity", self.metallicity)
            .field("Stellar_Type@ZAMS", self.initial_type.label())
            .field("Stellar_Type", self.stellar_type.label())
            .field("Age", self.age)
            .field("Kick", self.natal_kick.unwrap_or(0.0))
            .field("Timesteps", self.timesteps)
            .field("Status", self.status.label())
    }
}

/// A star with its own seeded random stream.
pub struct Star {
    object_id: u64,
    seed: u64,
    rng: ChaChaRng,
    initial_mass: f64,
    mass: f64,
    metallicity: f64,
    kick: KickParameters,
    initial_type: StellarType,
    stellar_type: StellarType,
    age: f64,
    ms_lifetime: f64,
    natal_kick: Option<f64>,
    sse_switch_log: bool,
}

impl std::fmt::Debug for Star {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Star")
            .field("object_id", &self.object_id)
            .field("seed", &self.seed)
            .field("mass", &self.mass)
            .field("stellar_type", &self.stellar_type)
            .field("age", &self.age)
            .finish()
    }
}

impl Star {
    pub fn new(
        object_id: u64,
        seed: u64,
        initial_mass: f64,
        metallicity: f64,
        kick: KickParameters,
    ) -> Result<Self, ConstructionError> {
        if !(initial_mass > 0.0 && initial_mass.is_finite()) {
            return Err(ConstructionError::InvalidMass(initial_mass));
        }
        if !(metallicity > 0.0 && metallicity < 1.0) {
            return Err(ConstructionError::InvalidMetallicity(metallicity));
        }

        let zams = StellarType::zams(initial_mass);
        Ok(Self {
            object_id,
            seed,
            rng: ChaChaRng::seed_from_u64(seed),
            initial_mass,
            mass: initial_mass,
            metallicity,
            kick,
            initial_type: zams,
            stellar_type: zams,
            age: 0.0,
            ms_lifetime: main_sequence_lifetime(initial_mass, metallicity),
            natal_kick: None,
            sse_switch_log: false,
        })
    }

    /// Write every switch to the single-star switch log.
    pub fn with_switch_log(mut self, enabled: bool) -> Self {
        self.sse_switch_log = enabled;
        self
    }

    pub fn object_id(&self) -> u64 {
        self.object_id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn initial_mass(&self) -> f64 {
        self.initial_mass
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn metallicity(&self) -> f64 {
        self.metallicity
    }

    pub fn initial_type(&self) -> StellarType {
        self.initial_type
    }

    pub fn stellar_type(&self) -> StellarType {
        self.stellar_type
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn natal_kick(&self) -> Option<f64> {
        self.natal_kick
    }

    /// Radius in AU.
    pub fn radius(&self) -> f64 {
        let m = self.mass;
        let rsun = match self.stellar_type {
            StellarType::MsLte07 | StellarType::MsGt07 => m.powf(0.8),
            StellarType::Che => 0.7 * m.powf(0.6),
            StellarType::HertzsprungGap => 5.0 * m.powf(0.8),
            StellarType::FirstGiantBranch => 40.0 * m.powf(0.6),
            StellarType::CoreHeliumBurning => 25.0 * m.powf(0.6),
            StellarType::EarlyAsymptoticGiantBranch => 150.0 * m.powf(0.6),
            StellarType::HeliumWhiteDwarf
            | StellarType::CarbonOxygenWhiteDwarf
            | StellarType::OxygenNeonWhiteDwarf => 0.012,
            StellarType::NeutronStar => 1.4e-5,
            StellarType::BlackHole => 4.24e-6 * m,
            StellarType::MasslessRemnant => 0.0,
        };
        rsun * RSUN_AU
    }

    /// Next timestep in Myr; infinite once the star is a remnant.
    pub fn timestep(&self) -> f64 {
        if self.stellar_type.is_remnant() {
            f64::INFINITY
        } else if self.stellar_type.is_main_sequence() {
            self.ms_lifetime / 50.0
        } else {
            self.ms_lifetime / 500.0
        }
    }

    /// Phase the star should be in at its current age; `None` once its
    /// nuclear lifetime is over.
    fn scheduled_phase(&self) -> Option<StellarType> {
        let x = self.age / self.ms_lifetime;
        if self.initial_type == StellarType::Che {
            return (x < 1.0).then_some(StellarType::Che);
        }
        if x < 1.0 {
            Some(self.initial_type)
        } else if x < HG_END {
            Some(StellarType::HertzsprungGap)
        } else if x < FGB_END {
            Some(StellarType::FirstGiantBranch)
        } else if x < CHEB_END {
            Some(StellarType::CoreHeliumBurning)
        } else if x < EAGB_END && self.initial_mass < EAGB_MAX_MASS {
            Some(StellarType::EarlyAsymptoticGiantBranch)
        } else {
            None
        }
    }

    /// Advance the star by `dt` Myr.
    pub fn step(&mut self, dt: f64, ctx: &dyn EvolutionContext) {
        self.age += dt;
        if self.stellar_type.is_remnant() {
            return;
        }

        if self.stellar_type.is_giant() {
            let floor = remnant_mass(
                remnant_type(self.initial_mass),
                self.initial_mass,
                self.metallicity,
            );
            let post_ms = (EAGB_END - 1.0) * self.ms_lifetime;
            let lost = 0.3 * (self.initial_mass - floor).max(0.0) * dt / post_ms;
            self.mass = (self.mass - lost).max(floor);
        }

        match self.scheduled_phase() {
            Some(phase) if phase != self.stellar_type => self.switch_to(phase, ctx),
            Some(_) => {}
            None => self.become_remnant(ctx),
        }
    }

    pub(crate) fn switch_to(&mut self, to: StellarType, ctx: &dyn EvolutionContext) {
        let from = self.stellar_type;
        if from == to {
            return;
        }
        self.stellar_type = to;

        if self.sse_switch_log {
            let record = LogRecord::new()
                .field("SEED", self.seed)
                .field("Age", self.age)
                .field("Mass", self.mass)
                .field("Switching_From", from.label())
                .field("Switching_To", to.label());
            ctx.log(LogFile::SseSwitchLog, record);
        }

        ctx.raise(Notification::StellarTypeSwitch(SwitchEvent {
            object_id: self.object_id,
            from,
            to,
            mass: self.mass,
            age: self.age,
        }));
    }

    /// Collapse to the remnant for this star's initial mass. Neutron stars
    /// and black holes receive a natal kick.
    pub fn become_remnant(&mut self, ctx: &dyn EvolutionContext) {
        let remnant = remnant_type(self.initial_mass);
        self.mass = remnant_mass(remnant, self.initial_mass, self.metallicity).min(self.mass);
        self.switch_to(remnant, ctx);

        if remnant.is_compact_object() {
            let kick = self.draw_kick();
            self.natal_kick = Some(kick);
            ctx.raise(Notification::Supernova {
                object_id: self.object_id,
                remnant,
                kick,
            });
        }
    }

    /// Start the star chemically homogeneous. Only meaningful at birth.
    pub fn begin_chemically_homogeneous(&mut self, ctx: &dyn EvolutionContext) {
        self.initial_type = StellarType::Che;
        self.switch_to(StellarType::Che, ctx);
    }

    pub fn accrete(&mut self, dm: f64) {
        self.mass += dm;
    }

    /// Give up `dm` of envelope to a companion. Returns the mass removed.
    pub fn donate(&mut self, dm: f64) -> f64 {
        let dm = dm.clamp(0.0, self.mass);
        self.mass -= dm;
        dm
    }

    /// The star has been absorbed by its companion.
    pub fn become_massless(&mut self, ctx: &dyn EvolutionContext) {
        self.mass = 0.0;
        self.switch_to(StellarType::MasslessRemnant, ctx);
    }

    fn draw_kick(&mut self) -> f64 {
        if self.kick.magnitude_specified {
            return self.kick.magnitude.max(0.0);
        }
        let u = if self.kick.magnitude_random_specified {
            self.kick.magnitude_random
        } else {
            self.rng.random::<f64>()
        };
        let u = u.clamp(0.0, 1.0 - f64::EPSILON);
        let magnitude = KICK_SIGMA * (-2.0 * (1.0 - u).ln()).sqrt();

        if self.stellar_type == StellarType::BlackHole && self.mass > 0.0 {
            magnitude * NS_REFERENCE_MASS / self.mass.max(NS_REFERENCE_MASS)
        } else {
            magnitude
        }
    }

    fn detailed_record(&self, index: usize) -> LogRecord {
        LogRecord::new()
            .field("Index", index as u64)
            .field("SEED", self.seed)
            .field("Age", self.age)
            .field("Mass", self.mass)
            .field("Radius", self.radius())
            .field("Stellar_Type", self.stellar_type.label())
    }

    /// Evolve a lone star until it is a remnant or a limit is reached, then
    /// write its system-parameters row.
    pub fn evolve(
        &mut self,
        index: usize,
        ctx: &dyn EvolutionContext,
        limits: &EvolutionLimits,
    ) -> StarOutcome {
        let mut steps = 0u64;
        let status = loop {
            if self.stellar_type.is_remnant() {
                break StarStatus::Remnant;
            }
            if self.age >= limits.max_time {
                ctx.report(self.object_id, ObjectError::TimeLimitReached(self.age));
                break StarStatus::TimeExceeded;
            }
            if steps >= limits.max_timesteps {
                ctx.report(self.object_id, ObjectError::TimestepLimitReached(steps));
                break StarStatus::TimestepsExceeded;
            }

            let dt = self.timestep().min(limits.max_time - self.age);
            self.step(dt, ctx);
            steps += 1;

            if limits.detailed_output {
                ctx.log(LogFile::SseDetailedOutput, self.detailed_record(index));
            }
        };

        let outcome = StarOutcome {
            object_id: self.object_id,
            seed: self.seed,
            initial_mass: self.initial_mass,
            mass: self.mass,
            metallicity: self.metallicity,
            initial_type: self.initial_type,
            stellar_type: self.stellar_type,
            age: self.age,
            natal_kick: self.natal_kick,
            status,
            timesteps: steps,
        };
        ctx.log(LogFile::SseSystemParameters, outcome.record(index));
        outcome
    }
}
