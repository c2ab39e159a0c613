use serde::{Deserialize, Serialize};

/// Min/max/avg triple reported for each measured quantity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub avg: Option<f64>,
}

impl Stats {
    pub fn get(&self, statistic: Statistic) -> Option<f64> {
        match statistic {
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::Avg => self.avg,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionalStats {
    #[serde(default)]
    pub input: Option<Stats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    #[serde(default)]
    pub voltage: Option<Stats>,
    #[serde(default)]
    pub current: Option<Stats>,
}

/// One telemetry bucket as returned by the vendor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReading {
    #[serde(default)]
    pub cumulative_active_power: Option<DirectionalStats>,
    #[serde(default)]
    pub active_power: Option<DirectionalStats>,
    #[serde(default)]
    pub phase_one: Option<PhaseStats>,
    #[serde(default)]
    pub phase_two: Option<PhaseStats>,
    #[serde(default)]
    pub phase_three: Option<PhaseStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Min,
    Max,
    Avg,
}

impl Statistic {
    pub const ALL: [Statistic; 3] = [Statistic::Min, Statistic::Max, Statistic::Avg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Avg => "avg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerUnit {
    Watt,
    Kilowatt,
}

impl PowerUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            PowerUnit::Watt => "W",
            PowerUnit::Kilowatt => "kW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    One,
    Two,
    Three,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::One, Phase::Two, Phase::Three];

    pub fn label(&self) -> &'static str {
        match self {
            Phase::One => "Phase One",
            Phase::Two => "Phase Two",
            Phase::Three => "Phase Three",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    Voltage,
    Current,
}

impl Measurement {
    pub const ALL: [Measurement; 2] = [Measurement::Voltage, Measurement::Current];

    pub fn unit(&self) -> &'static str {
        match self {
            Measurement::Voltage => "V",
            Measurement::Current => "A",
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl TelemetryReading {
    /// All-time imported energy in kWh (the maximum cumulative counter in the bucket)
    pub fn total_energy_kwh(&self) -> Option<f64> {
        self.cumulative_active_power
            .as_ref()?
            .input
            .as_ref()?
            .max
            .map(round2)
    }

    /// Imported active power for the bucket
    pub fn active_power(&self, statistic: Statistic, unit: PowerUnit) -> Option<f64> {
        let watts = self.active_power.as_ref()?.input.as_ref()?.get(statistic)?;
        Some(match unit {
            PowerUnit::Watt => round2(watts),
            PowerUnit::Kilowatt => round2(watts / 1000.0),
        })
    }

    /// Per-phase voltage or current.
    ///
    /// A phase that reports the measurement but omits the statistic reads as 0.
    pub fn phase_value(
        &self,
        phase: Phase,
        measurement: Measurement,
        statistic: Statistic,
    ) -> Option<f64> {
        let phase_stats = match phase {
            Phase::One => self.phase_one.as_ref(),
            Phase::Two => self.phase_two.as_ref(),
            Phase::Three => self.phase_three.as_ref(),
        }?;
        let stats = match measurement {
            Measurement::Voltage => phase_stats.voltage.as_ref(),
            Measurement::Current => phase_stats.current.as_ref(),
        }?;
        Some(round2(stats.get(statistic).unwrap_or(0.0)))
    }
}
