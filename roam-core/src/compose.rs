//! Final response text. Purely cosmetic: nothing in here feeds back into
//! state, caching, or control flow.

use crate::types::{Intent, Location, WeatherReport};
use std::collections::HashMap;

/// What the fetch phase managed to produce for the composer.
#[derive(Debug, Default)]
pub struct ResponseBundle {
    pub weather: Option<WeatherReport>,
    pub places: Option<PlacesShowing>,
}

/// The deduplicated batch of place names selected for this turn.
#[derive(Debug, Default)]
pub struct PlacesShowing {
    pub names: Vec<String>,
    pub exhausted: bool,
}

/// Render the turn's answer from whatever the fetch phase produced.
pub fn compose(
    intent: Intent,
    location: &Location,
    bundle: &ResponseBundle,
    is_followup: bool,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    match intent {
        Intent::Weather => {
            if let Some(weather) = &bundle.weather {
                parts.push(format_weather(&location.name, weather));
            }
        }
        Intent::Places => {
            if let Some(showing) = &bundle.places {
                places_section(&mut parts, &location.name, showing, is_followup, false);
            }
        }
        Intent::Both | Intent::Unknown => {
            if let Some(weather) = &bundle.weather {
                parts.push(format_weather(&location.name, weather));
            }
            if let Some(showing) = &bundle.places {
                if !showing.names.is_empty() || (showing.exhausted && is_followup) {
                    parts.push(String::new());
                    places_section(&mut parts, &location.name, showing, is_followup, true);
                }
            }
        }
    }

    if parts.is_empty() {
        return format!(
            "I found information about {}, but couldn't retrieve specific details.",
            location.name
        );
    }
    parts.join("\n")
}

fn places_section(
    parts: &mut Vec<String>,
    location_name: &str,
    showing: &PlacesShowing,
    is_followup: bool,
    combined: bool,
) {
    if showing.exhausted && is_followup {
        parts.push(format!(
            "I've shown you all the available tourist attractions in {location_name}."
        ));
        return;
    }
    if showing.names.is_empty() {
        if !combined {
            parts.push(format!(
                "I couldn't find any tourist attractions in {location_name} at the moment."
            ));
        }
        return;
    }

    let header = if is_followup {
        format!("Here are some more places you can visit in {location_name}:")
    } else if combined {
        "And these are the places you can go:".to_string()
    } else {
        format!("In {location_name} these are the places you can go:")
    };
    parts.push(header);
    for name in &showing.names {
        parts.push(format!("- {name}"));
    }
}

fn format_weather(location_name: &str, weather: &WeatherReport) -> String {
    let mut lines = Vec::new();

    let mut line = format!(
        "In {location_name} it's currently {}°C with {}.",
        weather.temperature, weather.condition
    );
    if let Some(feels_like) = weather.feels_like {
        if (feels_like - weather.temperature).abs() > 2.0 {
            line.push_str(&format!(" Feels like {feels_like}°C."));
        }
    }
    lines.push(line);

    let mut details = Vec::new();
    if let Some(rain) = weather.rain_probability {
        if rain > 0 {
            details.push(format!("{rain}% chance of rain"));
        }
    }
    if let Some(humidity) = weather.humidity {
        details.push(format!("humidity {humidity}%"));
    }
    if let Some(wind) = weather.wind_speed {
        details.push(format!("wind {wind} km/h"));
    }
    if !details.is_empty() {
        lines.push(format!("({})", details.join(", ")));
    }

    if let Some(summary) = weekly_summary(weather) {
        lines.push(String::new());
        lines.push(summary);
    }

    lines.join("\n")
}

fn weekly_summary(weather: &WeatherReport) -> Option<String> {
    let daily = &weather.daily_forecast;
    if daily.is_empty() {
        return None;
    }

    let max_temp = daily.iter().map(|d| d.max_temp).fold(f64::MIN, f64::max);
    let min_temp = daily.iter().map(|d| d.min_temp).fold(f64::MAX, f64::min);
    let rainy_days = daily.iter().filter(|d| d.rain_probability > 40).count();

    let mut summary = format!(
        "📅 Week ahead: Expect temperatures between {min_temp:.0}°C and {max_temp:.0}°C"
    );
    if rainy_days > 0 {
        let plural = if rainy_days > 1 { "s" } else { "" };
        summary.push_str(&format!(", with rain likely on {rainy_days} day{plural}."));
    } else {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for day in daily {
            *counts.entry(day.condition.as_str()).or_default() += 1;
        }
        // Ties break toward the alphabetically-first condition so the
        // phrasing is stable.
        let most_common = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
            .map(|(condition, _)| condition.to_lowercase())
            .unwrap_or_default();
        summary.push_str(&format!(", mostly {most_common}."));
    }
    Some(summary)
}
