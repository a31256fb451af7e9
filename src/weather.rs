//! Bundled weather calculation toolset
//!
//! Pure, stateless functions registered by the server binary as its default
//! tool set: unit conversions plus NWS heat index, wind chill, Magnus dew
//! point and barometric sea-level pressure. All carry the `weather` domain
//! tag so exposure filtering has real material to work with.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{HostError, Result};
use crate::registry::{ToolRegistry, ToolSpec};

/// Register the full weather toolset
pub fn register_weather_tools(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(ToolSpec {
        name: "celsius_to_fahrenheit".to_string(),
        description: "Convert temperature from Celsius to Fahrenheit".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "celsius": {"type": "number", "description": "Temperature in Celsius"}
            },
            "required": ["celsius"]
        }),
        domain: Some("weather".to_string()),
        category: Some("conversion".to_string()),
        handler: Arc::new(celsius_to_fahrenheit),
    })?;

    registry.register(ToolSpec {
        name: "fahrenheit_to_celsius".to_string(),
        description: "Convert temperature from Fahrenheit to Celsius".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "fahrenheit": {"type": "number", "description": "Temperature in Fahrenheit"}
            },
            "required": ["fahrenheit"]
        }),
        domain: Some("weather".to_string()),
        category: Some("conversion".to_string()),
        handler: Arc::new(fahrenheit_to_celsius),
    })?;

    registry.register(ToolSpec {
        name: "calculate_heat_index".to_string(),
        description: "Calculate heat index from temperature and humidity".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "temperature_f": {"type": "number", "description": "Temperature in Fahrenheit"},
                "humidity": {"type": "number", "description": "Relative humidity percentage (0-100)"}
            },
            "required": ["temperature_f", "humidity"]
        }),
        domain: Some("weather".to_string()),
        category: Some("calculation".to_string()),
        handler: Arc::new(calculate_heat_index),
    })?;

    registry.register(ToolSpec {
        name: "calculate_wind_chill".to_string(),
        description: "Calculate wind chill temperature".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "temperature_f": {"type": "number", "description": "Temperature in Fahrenheit"},
                "wind_speed_mph": {"type": "number", "description": "Wind speed in miles per hour"}
            },
            "required": ["temperature_f", "wind_speed_mph"]
        }),
        domain: Some("weather".to_string()),
        category: Some("calculation".to_string()),
        handler: Arc::new(calculate_wind_chill),
    })?;

    registry.register(ToolSpec {
        name: "calculate_dew_point".to_string(),
        description: "Calculate dew point from temperature and humidity".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "temperature_c": {"type": "number", "description": "Temperature in Celsius"},
                "humidity": {"type": "number", "description": "Relative humidity percentage (0-100)"}
            },
            "required": ["temperature_c", "humidity"]
        }),
        domain: Some("weather".to_string()),
        category: Some("calculation".to_string()),
        handler: Arc::new(calculate_dew_point),
    })?;

    registry.register(ToolSpec {
        name: "pressure_altitude_to_sea_level".to_string(),
        description: "Convert pressure reading to sea level equivalent".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "pressure_hpa": {"type": "number", "description": "Pressure in hectopascals (hPa)"},
                "altitude_m": {"type": "number", "description": "Station altitude in meters"},
                "temperature_c": {"type": "number", "description": "Temperature in Celsius"}
            },
            "required": ["pressure_hpa", "altitude_m", "temperature_c"]
        }),
        domain: Some("weather".to_string()),
        category: Some("calculation".to_string()),
        handler: Arc::new(pressure_altitude_to_sea_level),
    })?;

    Ok(())
}

fn num(args: &Value, field: &str) -> Result<f64> {
    args.get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| HostError::InvalidInput(format!("\"{field}\": expected number")))
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn celsius_to_fahrenheit(args: &Value) -> Result<Value> {
    let celsius = num(args, "celsius")?;
    let fahrenheit = celsius * 9.0 / 5.0 + 32.0;

    Ok(json!({
        "input": { "celsius": celsius },
        "result": { "fahrenheit": round2(fahrenheit) },
        "formula": "°F = (°C × 9/5) + 32"
    }))
}

fn fahrenheit_to_celsius(args: &Value) -> Result<Value> {
    let fahrenheit = num(args, "fahrenheit")?;
    let celsius = (fahrenheit - 32.0) * 5.0 / 9.0;

    Ok(json!({
        "input": { "fahrenheit": fahrenheit },
        "result": { "celsius": round2(celsius) },
        "formula": "°C = (°F - 32) × 5/9"
    }))
}

/// Rothfusz regression (NWS standard) with the low/high humidity adjustments
fn calculate_heat_index(args: &Value) -> Result<Value> {
    let t = num(args, "temperature_f")?;
    let r = num(args, "humidity")?;

    let heat_index = if t < 80.0 {
        t
    } else {
        let mut hi = -42.379 + 2.04901523 * t + 10.14333127 * r
            - 0.22475541 * t * r
            - 6.83783e-3 * t * t
            - 5.481717e-2 * r * r
            + 1.22874e-3 * t * t * r
            + 8.5282e-4 * t * r * r
            - 1.99e-6 * t * t * r * r;

        if r < 13.0 && (80.0..=112.0).contains(&t) {
            hi -= ((13.0 - r) / 4.0) * (((17.0 - (t - 95.0).abs()) / 17.0).sqrt());
        } else if r > 85.0 && (80.0..=87.0).contains(&t) {
            hi += ((r - 85.0) / 10.0) * ((87.0 - t) / 5.0);
        }

        hi
    };

    let risk_level = if heat_index < 80.0 {
        "No risk"
    } else if heat_index < 90.0 {
        "Caution"
    } else if heat_index < 105.0 {
        "Extreme caution"
    } else if heat_index < 130.0 {
        "Danger"
    } else {
        "Extreme danger"
    };

    Ok(json!({
        "input": {
            "temperature_f": t,
            "humidity_percent": r
        },
        "result": {
            "heat_index_f": round1(heat_index),
            "risk_level": risk_level
        },
        "formula": "Rothfusz regression (NWS standard)"
    }))
}

/// NWS wind chill; only applicable when T <= 50°F and wind >= 3 mph
fn calculate_wind_chill(args: &Value) -> Result<Value> {
    let t = num(args, "temperature_f")?;
    let v = num(args, "wind_speed_mph")?;

    let (wind_chill, applicable) = if t > 50.0 || v < 3.0 {
        (t, false)
    } else {
        let chill = 35.74 + 0.6215 * t - 35.75 * v.powf(0.16) + 0.4275 * t * v.powf(0.16);
        (chill, true)
    };

    let risk_level = if !applicable {
        "Not applicable"
    } else if wind_chill > 16.0 {
        "No risk"
    } else if wind_chill > -15.0 {
        "Uncomfortable"
    } else if wind_chill > -35.0 {
        "Risk of frostbite"
    } else {
        "Extreme risk"
    };

    Ok(json!({
        "input": {
            "temperature_f": t,
            "wind_speed_mph": v
        },
        "result": {
            "wind_chill_f": round1(wind_chill),
            "applicable": applicable,
            "risk_level": risk_level
        },
        "formula": "NWS Wind Chill formula",
        "note": "Only applicable when T ≤ 50°F and wind ≥ 3 mph"
    }))
}

/// Magnus formula approximation
fn calculate_dew_point(args: &Value) -> Result<Value> {
    let t = num(args, "temperature_c")?;
    let rh = num(args, "humidity")?;

    if rh <= 0.0 || rh > 100.0 {
        return Err(HostError::InvalidInput(
            "\"humidity\": must be in (0, 100]".to_string(),
        ));
    }

    let a = 17.27;
    let b = 237.7;

    let alpha = (a * t) / (b + t) + (rh / 100.0).ln();
    let dew_point = (b * alpha) / (a - alpha);
    let dew_point_f = dew_point * 9.0 / 5.0 + 32.0;

    let comfort = if dew_point_f < 50.0 {
        "Very dry"
    } else if dew_point_f < 55.0 {
        "Comfortable"
    } else if dew_point_f < 60.0 {
        "Slightly humid"
    } else if dew_point_f < 65.0 {
        "Humid"
    } else if dew_point_f < 70.0 {
        "Very humid"
    } else {
        "Oppressive"
    };

    Ok(json!({
        "input": {
            "temperature_c": t,
            "humidity_percent": rh
        },
        "result": {
            "dew_point_c": round2(dew_point),
            "dew_point_f": round2(dew_point_f),
            "comfort_level": comfort
        },
        "formula": "Magnus formula approximation"
    }))
}

/// Barometric formula
fn pressure_altitude_to_sea_level(args: &Value) -> Result<Value> {
    let p = num(args, "pressure_hpa")?;
    let h = num(args, "altitude_m")?;
    let t_c = num(args, "temperature_c")?;
    let t = t_c + 273.15;

    if t <= 0.0 {
        return Err(HostError::InvalidInput(
            "\"temperature_c\": below absolute zero".to_string(),
        ));
    }

    let g = 9.80665;
    let m = 0.0289644;
    let r = 8.31432;

    let sea_level = p * ((g * m * h) / (r * t)).exp();

    Ok(json!({
        "input": {
            "station_pressure_hpa": p,
            "altitude_m": h,
            "temperature_c": t_c
        },
        "result": {
            "sea_level_pressure_hpa": round2(sea_level),
            "pressure_difference_hpa": round2(sea_level - p)
        },
        "formula": "Barometric formula"
    }))
}
