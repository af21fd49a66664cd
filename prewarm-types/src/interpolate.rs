//! Placeholder expansion for request templates.
//!
//! The following placeholders are recognized anywhere inside a path, body or gRPC message:
//!
//!  - `{numbers-N}`: `N` random decimal digits
//!  - `{chars-N}`: `N` random alphanumeric characters (`a-z`, `A-Z`, `0-9`)
//!  - `{today+N}`: the current date plus `N` days, formatted as `YYYY-MM-DD`
//!  - `{tomorrow}`: shorthand for `{today+1}`
//!
//! Every occurrence is expanded independently, so two `{numbers-5}` in the same string receive
//! different digits. Anything that does not match one of these forms exactly, such as
//! `{numbers-abc}` or an unbalanced brace, is left in the output verbatim. So are `{numbers-N}`
//! and `{chars-N}` with `N` above 65536.

use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{Days, Local, NaiveDate};
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use regex::{Captures, Regex};

/// Matches all supported placeholders. Capture groups hold the numeric argument.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(?:numbers-(\d+)|chars-(\d+)|today\+(\d+)|tomorrow)\}")
        .expect("placeholder pattern is valid")
});

/// Longest random value a single placeholder may produce.
const MAX_RANDOM_LEN: usize = 65_536;

/// Date format used by `{today+N}` and `{tomorrow}`.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of the current calendar date for date placeholders.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns today's date.
    fn today(&self) -> NaiveDate;
}

/// A [`Clock`] that reads the local date of the host.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A [`Clock`] that is pinned to a given date.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Expands placeholders in request templates.
///
/// The interpolator owns its random number generator and shares its [`Clock`]. Use
/// [`Interpolator::with_sources`] to make expansion deterministic, for instance with a seeded
/// RNG and a [`FixedClock`].
pub struct Interpolator {
    rng: Box<dyn RngCore + Send>,
    clock: Arc<dyn Clock>,
}

impl Interpolator {
    /// Creates an interpolator seeded from the operating system with the [`SystemClock`].
    pub fn new() -> Self {
        Self::with_sources(StdRng::from_os_rng(), SystemClock)
    }

    /// Creates an interpolator from an explicit random source and clock.
    pub fn with_sources<R, C>(rng: R, clock: C) -> Self
    where
        R: RngCore + Send + 'static,
        C: Clock + 'static,
    {
        Self {
            rng: Box::new(rng),
            clock: Arc::new(clock),
        }
    }

    /// Returns a copy of `input` with all recognized placeholders replaced.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use prewarm_types::{FixedClock, Interpolator};
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
    /// let mut interpolator = Interpolator::with_sources(StdRng::seed_from_u64(0), clock);
    ///
    /// assert_eq!(interpolator.expand("/day/{today+2}"), "/day/2024-03-01");
    /// assert_eq!(interpolator.expand("{numbers-4}").len(), 4);
    /// ```
    pub fn expand(&mut self, input: &str) -> String {
        let Self { rng, clock } = self;

        PLACEHOLDER
            .replace_all(input, |caps: &Captures<'_>| {
                let expanded = if let Some(count) = caps.get(1) {
                    count
                        .as_str()
                        .parse()
                        .ok()
                        .filter(|&count| count <= MAX_RANDOM_LEN)
                        .map(|count| random_digits(rng.as_mut(), count))
                } else if let Some(count) = caps.get(2) {
                    count
                        .as_str()
                        .parse()
                        .ok()
                        .filter(|&count| count <= MAX_RANDOM_LEN)
                        .map(|count| random_chars(rng.as_mut(), count))
                } else if let Some(days) = caps.get(3) {
                    days.as_str()
                        .parse()
                        .ok()
                        .and_then(|days| date_after(clock.as_ref(), days))
                } else {
                    date_after(clock.as_ref(), 1)
                };

                // Arguments out of range are treated like any other malformed placeholder.
                expanded.unwrap_or_else(|| caps[0].to_owned())
            })
            .into_owned()
    }
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpolator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpolator")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

fn random_digits(rng: &mut dyn RngCore, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

fn random_chars(rng: &mut dyn RngCore, count: usize) -> String {
    (0..count)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

fn date_after(clock: &dyn Clock, days: u64) -> Option<String> {
    let date = clock.today().checked_add_days(Days::new(days))?;
    Some(date.format(DATE_FORMAT).to_string())
}
