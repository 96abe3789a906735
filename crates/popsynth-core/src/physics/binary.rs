//! Binary-star evolution.
//!
//! A `BinaryStar` owns its two stars behind `RefCell`s so it can be read
//! while one of them is stepping: a stellar-type switch raised from inside
//! `Star::step` may come straight back to
//! [`BinaryStar::print_switch_log`] on the same binary.

use std::cell::{Cell, RefCell};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sampling::{sample_log_uniform, sample_mass_kroupa, KROUPA_MIN_MASS};
use super::{EvolutionContext, EvolutionLimits, Star, StellarType, SwitchEvent};
use crate::domain::{ConstructionError, ObjectError};
use crate::logging::{LogFile, LogRecord};
use crate::options::{CheMode, ObjectParameters, ProgramOptions};

/// Orbital speed of a 1 M☉ system at 1 AU, km/s.
const V_ORB_1AU: f64 = 29.78;

/// Common-envelope efficiency times envelope structure parameter.
const ALPHA_LAMBDA: f64 = 0.5;

/// Donor-to-accretor mass ratio above which mass transfer is unstable.
const Q_CRIT: f64 = 3.0;

/// Fraction of the donor's mass moved per step of stable transfer.
const TRANSFER_FRACTION: f64 = 0.1;

const CHE_MIN_MASS: f64 = 20.0;

/// Separation redraws before giving up on a binary whose stars touch.
const MAX_SEPARATION_DRAWS: usize = 100;

/// Eggleton (1983) Roche-lobe radius as a fraction of the separation.
pub fn roche_lobe_fraction(q: f64) -> f64 {
    let q23 = q.powf(2.0 / 3.0);
    0.49 * q23 / (0.6 * q23 + (1.0 + q.cbrt()).ln())
}

/// Construction settings shared by every binary in a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryConfig {
    pub mass_min: f64,
    pub mass_max: f64,
    pub separation_min: f64,
    pub separation_max: f64,
    pub che_mode: CheMode,
}

impl BinaryConfig {
    pub fn from_options(options: &ProgramOptions) -> Self {
        Self {
            mass_min: options.initial_mass_min,
            mass_max: options.initial_mass_max,
            separation_min: options.semi_major_axis_min,
            separation_max: options.semi_major_axis_max,
            che_mode: options.che_mode,
        }
    }

    /// Widest orbit, in AU, tight enough for tidal spin-up to keep a
    /// massive star chemically homogeneous.
    fn che_max_separation(&self) -> Option<f64> {
        match self.che_mode {
            CheMode::None => None,
            CheMode::Optimistic => Some(0.3),
            CheMode::Pessimistic => Some(0.15),
        }
    }
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self::from_options(&ProgramOptions::default())
    }
}

/// How a binary evolution ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BinaryStatus {
    Evolving,
    DoubleCompactObject,
    BothRemnants,
    Merged,
    Disrupted,
    TimeExceeded,
    TimestepsExceeded,
}

impl BinaryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BinaryStatus::Evolving => "Evolving",
            BinaryStatus::DoubleCompactObject => "Double compact object formed",
            BinaryStatus::BothRemnants => "Both stars are remnants",
            BinaryStatus::Merged => "Stars merged",
            BinaryStatus::Disrupted => "Binary disrupted",
            BinaryStatus::TimeExceeded => "Allowed time exceeded",
            BinaryStatus::TimestepsExceeded => "Allowed timesteps exceeded",
        }
    }
}

impl std::fmt::Display for BinaryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Final state of a binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinaryOutcome {
    pub index: usize,
    pub seed: u64,
    pub object_id: u64,
    pub status: BinaryStatus,
    pub initial_masses: (f64, f64),
    pub masses: (f64, f64),
    pub initial_types: (StellarType, StellarType),
    pub stellar_types: (StellarType, StellarType),
    pub initial_separation: f64,
    pub separation: f64,
    /// Physical time at the end, Myr.
    pub time: f64,
    pub timesteps: u64,
}

impl BinaryOutcome {
    pub fn is_double_compact_object(&self) -> bool {
        self.status == BinaryStatus::DoubleCompactObject
    }

    /// Either star started chemically homogeneous.
    pub fn is_che(&self) -> bool {
        self.initial_types.0 == StellarType::Che || self.initial_types.1 == StellarType::Che
    }

    /// System-parameters row for this binary.
    pub fn record(&self) -> LogRecord {
        LogRecord::new()
            .field("Index", self.index as u64)
            .field("SEED", self.seed)
            .field("Mass@ZAMS(1)", self.initial_masses.0)
            .field("Mass@ZAMS(2)", self.initial_masses.1)
            .field("Mass(1)", self.masses.0)
            .field("Mass(2)", self.masses.1)
            .field("Stellar_Type@ZAMS(1)", self.initial_types.0.label())
            .field("Stellar_Type@ZAMS(2)", self.initial_types.1.label())
            .field("Stellar_Type(1)", self.stellar_types.0.label())
            .field("Stellar_Type(2)", self.stellar_types.1.label())
            .field("Separation@ZAMS", self.initial_separation)
            .field("Separation", self.separation)
            .field("Time", self.time)
            .field("Timesteps", self.timesteps)
            .field("Status", self.status.label())
    }
}

pub struct BinaryStar {
    object_id: u64,
    index: usize,
    seed: u64,
    star1: RefCell<Star>,
    star2: RefCell<Star>,
    star1_id: u64,
    star2_id: u64,
    initial_separation: f64,
    /// Semi-major axis, AU.
    separation: Cell<f64>,
    time: Cell<f64>,
    steps: Cell<u64>,
    status: Cell<BinaryStatus>,
}

impl BinaryStar {
    /// Build a binary from `params`, drawing whatever they leave unset from
    /// a stream seeded with `seed`. Fails without side effects on the sweep
    /// if the parameters cannot describe a detached binary.
    pub fn new(
        index: usize,
        seed: u64,
        params: &ObjectParameters,
        config: &BinaryConfig,
        ctx: &dyn EvolutionContext,
    ) -> Result<Self, ConstructionError> {
        let mut rng = ChaChaRng::seed_from_u64(seed);

        let m1 = params
            .initial_mass_1
            .unwrap_or_else(|| sample_mass_kroupa(&mut rng, config.mass_min, config.mass_max));
        let m2 = params.initial_mass_2.unwrap_or_else(|| {
            let q: f64 = rng.random_range(0.1..1.0);
            (q * m1).max(KROUPA_MIN_MASS)
        });
        let seed1: u64 = rng.random();
        let seed2: u64 = rng.random();

        let object_id = ctx.next_object_id();
        let mut star1 = Star::new(
            ctx.next_object_id(),
            seed1,
            m1,
            params.metallicity,
            params.primary_kick(),
        )?;
        let mut star2 = Star::new(
            ctx.next_object_id(),
            seed2,
            m2,
            params.metallicity,
            params.secondary_kick(),
        )?;

        let radii = star1.radius() + star2.radius();
        let separation = match params.semi_major_axis {
            Some(a) => {
                if !(a > 0.0 && a.is_finite()) {
                    return Err(ConstructionError::InvalidSeparation(a));
                }
                a
            }
            None => {
                let mut a = sample_log_uniform(&mut rng, config.separation_min, config.separation_max);
                for _ in 1..MAX_SEPARATION_DRAWS {
                    if a > radii {
                        break;
                    }
                    a = sample_log_uniform(&mut rng, config.separation_min, config.separation_max);
                }
                a
            }
        };
        if separation <= radii {
            return Err(ConstructionError::TouchingAtBirth { separation, radii });
        }

        if let Some(max) = config.che_max_separation() {
            if separation <= max {
                for star in [&mut star1, &mut star2] {
                    if star.mass() >= CHE_MIN_MASS {
                        star.begin_chemically_homogeneous(ctx);
                    }
                }
            }
        }

        Ok(Self {
            object_id,
            index,
            seed,
            star1_id: star1.object_id(),
            star2_id: star2.object_id(),
            star1: RefCell::new(star1),
            star2: RefCell::new(star2),
            initial_separation: separation,
            separation: Cell::new(separation),
            time: Cell::new(0.0),
            steps: Cell::new(0),
            status: Cell::new(BinaryStatus::Evolving),
        })
    }

    pub fn object_id(&self) -> u64 {
        self.object_id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn star_ids(&self) -> (u64, u64) {
        (self.star1_id, self.star2_id)
    }

    pub fn separation(&self) -> f64 {
        self.separation.get()
    }

    pub fn time(&self) -> f64 {
        self.time.get()
    }

    pub fn status(&self) -> BinaryStatus {
        self.status.get()
    }

    pub fn stellar_types(&self) -> (StellarType, StellarType) {
        (
            self.star1.borrow().stellar_type(),
            self.star2.borrow().stellar_type(),
        )
    }

    pub fn initial_types(&self) -> (StellarType, StellarType) {
        (
            self.star1.borrow().initial_type(),
            self.star2.borrow().initial_type(),
        )
    }

    fn total_mass(&self) -> f64 {
        self.star1.borrow().mass() + self.star2.borrow().mass()
    }

    /// Evolve until an end state or a limit, then write the
    /// system-parameters row.
    pub fn evolve(&self, ctx: &dyn EvolutionContext, limits: &EvolutionLimits) -> BinaryOutcome {
        let status = loop {
            let (t1, t2) = self.stellar_types();
            if t1.is_remnant() && t2.is_remnant() {
                break if t1.is_compact_object() && t2.is_compact_object() {
                    BinaryStatus::DoubleCompactObject
                } else {
                    BinaryStatus::BothRemnants
                };
            }
            if self.time.get() >= limits.max_time {
                ctx.report(self.object_id, ObjectError::TimeLimitReached(self.time.get()));
                break BinaryStatus::TimeExceeded;
            }
            if self.steps.get() >= limits.max_timesteps {
                ctx.report(
                    self.object_id,
                    ObjectError::TimestepLimitReached(self.steps.get()),
                );
                break BinaryStatus::TimestepsExceeded;
            }

            let dt = self
                .star1
                .borrow()
                .timestep()
                .min(self.star2.borrow().timestep())
                .min(limits.max_time - self.time.get());

            if let Some(end) = self.step_star(&self.star1, dt, ctx) {
                break end;
            }
            if let Some(end) = self.step_star(&self.star2, dt, ctx) {
                break end;
            }
            self.time.set(self.time.get() + dt);
            self.steps.set(self.steps.get() + 1);

            if let Some(end) = self.check_roche_lobes(ctx) {
                break end;
            }
            if limits.detailed_output {
                ctx.log(LogFile::BseDetailedOutput, self.detailed_record());
            }
        };

        self.status.set(status);
        let outcome = self.outcome();
        ctx.log(LogFile::BseSystemParameters, outcome.record());
        outcome
    }

    fn step_star(
        &self,
        star: &RefCell<Star>,
        dt: f64,
        ctx: &dyn EvolutionContext,
    ) -> Option<BinaryStatus> {
        let total_before = self.total_mass();
        let exploded = {
            let mut s = star.borrow_mut();
            let was_remnant = s.stellar_type().is_remnant();
            s.step(dt, ctx);
            !was_remnant && s.stellar_type().is_compact_object()
        };
        let total_after = self.total_mass();

        if exploded {
            let kick = star.borrow().natal_kick().unwrap_or(0.0);
            return self.apply_supernova(total_before, total_after, kick);
        }
        if total_after > 0.0 && total_after < total_before {
            self.separation
                .set(self.separation.get() * total_before / total_after);
        }
        None
    }

    /// Instantaneous mass loss plus a kick perpendicular to the orbital
    /// velocity. Returns `Disrupted` if the orbit becomes unbound.
    fn apply_supernova(&self, total_before: f64, total_after: f64, kick: f64) -> Option<BinaryStatus> {
        let a = self.separation.get();
        let v_orb = V_ORB_1AU * (total_before / a).sqrt();
        let mu = total_after / total_before;

        let v2 = v_orb * v_orb + kick * kick;
        let bound = v2 < 2.0 * v_orb * v_orb * mu;
        if !bound {
            return Some(BinaryStatus::Disrupted);
        }
        let denominator = 2.0 - v2 / (v_orb * v_orb * mu);
        self.separation.set(a / denominator);
        None
    }

    fn check_roche_lobes(&self, ctx: &dyn EvolutionContext) -> Option<BinaryStatus> {
        for (donor, accretor) in [(&self.star1, &self.star2), (&self.star2, &self.star1)] {
            let (radius, m_d, t_d) = {
                let d = donor.borrow();
                (d.radius(), d.mass(), d.stellar_type())
            };
            let m_a = accretor.borrow().mass();
            if t_d.is_remnant() || m_a <= 0.0 {
                continue;
            }
            let roche = self.separation.get() * roche_lobe_fraction(m_d / m_a);
            if radius <= roche {
                continue;
            }
            if let Some(end) = self.mass_transfer(donor, accretor, ctx) {
                return Some(end);
            }
        }
        None
    }

    fn mass_transfer(
        &self,
        donor: &RefCell<Star>,
        accretor: &RefCell<Star>,
        ctx: &dyn EvolutionContext,
    ) -> Option<BinaryStatus> {
        let (m_d, t_d) = {
            let d = donor.borrow();
            (d.mass(), d.stellar_type())
        };
        let m_a = accretor.borrow().mass();
        let a = self.separation.get();

        if !t_d.is_giant() {
            if m_d / m_a > Q_CRIT {
                return Some(self.merge(donor, accretor, ctx));
            }
            // Conservative transfer: a * (M_d * M_a)^2 is constant.
            let dm = donor.borrow_mut().donate(TRANSFER_FRACTION * m_d);
            accretor.borrow_mut().accrete(dm);
            let (m_d2, m_a2) = (m_d - dm, m_a + dm);
            self.separation
                .set(a * ((m_d * m_a) / (m_d2 * m_a2)).powi(2));
            return None;
        }

        // Common envelope: the giant's envelope is ejected using orbital
        // energy and the core spirals in.
        let total_before = self.total_mass();
        let r_l = roche_lobe_fraction(m_d / m_a);
        donor.borrow_mut().become_remnant(ctx);
        let (m_core, core_radius, kick) = {
            let d = donor.borrow();
            (d.mass(), d.radius(), d.natal_kick())
        };
        let m_env = (m_d - m_core).max(0.0);
        let a_final = a / ((m_d / m_core) * (1.0 + 2.0 * m_env / (ALPHA_LAMBDA * r_l * m_a)));
        self.separation.set(a_final);

        if a_final <= core_radius + accretor.borrow().radius() {
            return Some(self.merge(donor, accretor, ctx));
        }
        match kick {
            Some(kick) => self.apply_supernova(total_before - m_env, self.total_mass(), kick),
            None => None,
        }
    }

    fn merge(
        &self,
        donor: &RefCell<Star>,
        accretor: &RefCell<Star>,
        ctx: &dyn EvolutionContext,
    ) -> BinaryStatus {
        let m_d = donor.borrow().mass();
        accretor.borrow_mut().accrete(m_d);
        donor.borrow_mut().become_massless(ctx);
        BinaryStatus::Merged
    }

    /// Write a switch-log row for a type change of one of this binary's
    /// stars. Switches of other objects are ignored.
    pub fn print_switch_log(&self, event: &SwitchEvent, ctx: &dyn EvolutionContext) {
        let (which, companion) = if event.object_id == self.star1_id {
            (1u8, &self.star2)
        } else if event.object_id == self.star2_id {
            (2u8, &self.star1)
        } else {
            return;
        };

        // The switching star is mutably borrowed while it steps; its state
        // comes from the event. The companion is idle.
        let (companion_type, companion_mass) = match companion.try_borrow() {
            Ok(s) => (Some(s.stellar_type().label()), Some(s.mass())),
            Err(_) => (None, None),
        };

        let record = LogRecord::new()
            .field("Index", self.index as u64)
            .field("SEED", self.seed)
            .field("Time", event.age)
            .field("Star_Switching", which)
            .field("Switching_From", event.from.label())
            .field("Switching_To", event.to.label())
            .field("Mass_Switching", event.mass)
            .field("Companion_Type", Value::from(companion_type))
            .field("Companion_Mass", Value::from(companion_mass))
            .field("Separation", self.separation.get());
        ctx.log(LogFile::BseSwitchLog, record);
    }

    fn detailed_record(&self) -> LogRecord {
        let s1 = self.star1.borrow();
        let s2 = self.star2.borrow();
        LogRecord::new()
            .field("Index", self.index as u64)
            .field("SEED", self.seed)
            .field("Time", self.time.get())
            .field("Separation", self.separation.get())
            .field("Mass(1)", s1.mass())
            .field("Mass(2)", s2.mass())
            .field("Radius(1)", s1.radius())
            .field("Radius(2)", s2.radius())
            .field("Stellar_Type(1)", s1.stellar_type().label())
            .field("Stellar_Type(2)", s2.stellar_type().label())
    }

    fn outcome(&self) -> BinaryOutcome {
        let s1 = self.star1.borrow();
        let s2 = self.star2.borrow();
        BinaryOutcome {
            index: self.index,
            seed: self.seed,
            object_id: self.object_id,
            status: self.status.get(),
            initial_masses: (s1.initial_mass(), s2.initial_mass()),
            masses: (s1.mass(), s2.mass()),
            initial_types: (s1.initial_type(), s2.initial_type()),
            stellar_types: (s1.stellar_type(), s2.stellar_type()),
            initial_separation: self.initial_separation,
            separation: self.separation.get(),
            time: self.time.get(),
            timesteps: self.steps.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingContext;
    use crate::physics::Notification;

    fn params(m1: f64, m2: f64, a: f64) -> ObjectParameters {
        ObjectParameters {
            initial_mass_1: Some(m1),
            initial_mass_2: Some(m2),
            semi_major_axis: Some(a),
            metallicity: 0.0142,
            ..ObjectParameters::default()
        }
    }

    #[test]
    fn test_roche_lobe_fraction_equal_masses() {
        approx::assert_relative_eq!(roche_lobe_fraction(1.0), 0.3789, epsilon = 1e-3);
    }

    #[test]
    fn test_touching_stars_fail_construction() {
        let ctx = RecordingContext::default();
        let result = BinaryStar::new(0, 1, &params(50.0, 45.0, 0.01), &BinaryConfig::default(), &ctx);
        assert!(matches!(
            result,
            Err(ConstructionError::TouchingAtBirth { .. })
        ));
        assert!(ctx.records(LogFile::BseSystemParameters).is_empty());
    }

    #[test]
    fn test_invalid_separation_rejected() {
        let ctx = RecordingContext::default();
        let result = BinaryStar::new(0, 1, &params(10.0, 8.0, -1.0), &BinaryConfig::default(), &ctx);
        assert!(matches!(result, Err(ConstructionError::InvalidSeparation(_))));
    }

    #[test]
    fn test_drawn_parameters_are_seed_deterministic() {
        let config = BinaryConfig::default();
        let base = ObjectParameters {
            metallicity: 0.0142,
            ..ObjectParameters::default()
        };
        let a = BinaryStar::new(0, 77, &base, &config, &RecordingContext::default()).unwrap();
        let b = BinaryStar::new(0, 77, &base, &config, &RecordingContext::default()).unwrap();
        assert_eq!(a.separation(), b.separation());
        assert_eq!(a.outcome().initial_masses, b.outcome().initial_masses);

        let mass = a.outcome().initial_masses.0;
        assert!((config.mass_min..=config.mass_max).contains(&mass));
    }

    #[test]
    fn test_wide_massive_binary_ends() {
        let ctx = RecordingContext::default();
        let binary =
            BinaryStar::new(4, 9, &params(40.0, 35.0, 5_000.0), &BinaryConfig::default(), &ctx)
                .unwrap();
        let outcome = binary.evolve(&ctx, &EvolutionLimits::default());

        assert_ne!(outcome.status, BinaryStatus::Evolving);
        assert_eq!(outcome.index, 4);
        assert_eq!(ctx.records(LogFile::BseSystemParameters).len(), 1);
    }

    #[test]
    fn test_unstable_main_sequence_transfer_merges() {
        let ctx = RecordingContext::default();
        let binary =
            BinaryStar::new(0, 3, &params(60.0, 5.0, 0.35), &BinaryConfig::default(), &ctx)
                .unwrap();
        let outcome = binary.evolve(&ctx, &EvolutionLimits::default());

        assert_eq!(outcome.status, BinaryStatus::Merged);
        assert_eq!(outcome.stellar_types.0, StellarType::MasslessRemnant);
    }

    #[test]
    fn test_che_switch_raised_during_construction() {
        let ctx = RecordingContext::default();
        let config = BinaryConfig {
            che_mode: CheMode::Optimistic,
            ..BinaryConfig::default()
        };
        let binary = BinaryStar::new(0, 5, &params(40.0, 38.0, 0.2), &config, &ctx).unwrap();

        assert_eq!(binary.initial_types(), (StellarType::Che, StellarType::Che));
        let che_switches = ctx
            .notifications()
            .iter()
            .filter(|n| {
                matches!(n, Notification::StellarTypeSwitch(e) if e.to == StellarType::Che)
            })
            .count();
        assert_eq!(che_switches, 2);
    }

    #[test]
    fn test_print_switch_log_ignores_foreign_objects() {
        let ctx = RecordingContext::default();
        let binary =
            BinaryStar::new(2, 9, &params(20.0, 15.0, 10.0), &BinaryConfig::default(), &ctx)
                .unwrap();
        let (id1, _) = binary.star_ids();

        let event = SwitchEvent {
            object_id: id1,
            from: StellarType::MsGt07,
            to: StellarType::HertzsprungGap,
            mass: 20.0,
            age: 8.0,
        };
        binary.print_switch_log(&event, &ctx);
        binary.print_switch_log(
            &SwitchEvent {
                object_id: 9_999,
                ..event
            },
            &ctx,
        );

        let rows = ctx.records(LogFile::BseSwitchLog);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Star_Switching"), Some(&serde_json::json!(1)));
        assert_eq!(
            rows[0].get("Companion_Type"),
            Some(&serde_json::json!("Main_Sequence_>_0.7"))
        );
    }
}
