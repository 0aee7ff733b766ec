//! Outage survival simulation.
//!
//! For every start step an outage begins with the battery at its reported
//! state of charge; the walk forward (wrapping at the end of the series)
//! stops at the first step whose load neither PV nor the battery can carry.

/// Battery sizing and dispatch state for one simulation.
#[derive(Debug, Clone, Copy)]
pub struct Battery<'a> {
    pub kw: f64,
    pub kwh: f64,
    /// State of charge per step as a fraction of `kwh`
    pub state_of_charge: &'a [f64],
    pub round_trip_efficiency: f64,
}

/// Mean number of hours a critical load survives an outage starting at any step.
pub fn average_survival_hours(
    battery: Battery<'_>,
    pv_production: &[f64],
    critical_load: &[f64],
    hours_per_step: f64,
) -> f64 {
    let steps = critical_load.len();
    if steps == 0 {
        return 0.0;
    }
    let no_battery = battery.kw == 0.0 || battery.kwh == 0.0;
    if no_battery && pv_production.iter().all(|pv| *pv == 0.0) {
        return 0.0;
    }
    let net: Vec<f64> = critical_load
        .iter()
        .enumerate()
        .map(|(t, load)| load - pv_production.get(t).copied().unwrap_or_default())
        .collect();
    let total: usize = (0..steps)
        .map(|start| {
            let soc = if no_battery {
                0.0
            } else {
                battery.state_of_charge.get(start).copied().unwrap_or_default() * battery.kwh
            };
            survived_steps(start, soc, &battery, &net, hours_per_step)
        })
        .sum();
    total as f64 / steps as f64 * hours_per_step
}

/// `net` is in kW; charge moves by `net * hours_per_step` kWh each step.
fn survived_steps(
    start: usize,
    mut soc: f64,
    battery: &Battery<'_>,
    net: &[f64],
    hours_per_step: f64,
) -> usize {
    let steps = net.len();
    for offset in 0..steps {
        let mut load = net[(start + offset) % steps];
        let energy = load * hours_per_step;
        if load < 0.0 {
            if soc < battery.kwh {
                soc += (battery.kwh - soc)
                    .min(battery.kw * battery.round_trip_efficiency * hours_per_step)
                    .min(-energy * battery.round_trip_efficiency);
            }
        } else if battery.kw >= load && soc >= energy {
            soc = (soc - energy).max(0.0);
            load = 0.0;
        }
        // shortfalls below 1e-5 kW count as met
        if (load * 1e5).round() > 0.0 {
            return offset;
        }
    }
    steps
}
