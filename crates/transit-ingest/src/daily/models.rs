//! Route detail documents returned by `conocerecorrido`
//!
//! The upstream API is loose with types: identifiers and coordinates arrive as
//! numbers or as strings depending on the route. Every scalar here goes
//! through the [`lenient`] deserializers and every field is optional.

use serde::Deserialize;
use serde_json::Value;

pub mod lenient {
    //! Deserializers accepting a value as a JSON number, string, or null

    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn parse<'de, D, T>(
        deserializer: D,
        convert: impl FnOnce(&Value) -> Option<T>,
        expected: &str,
    ) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(v) => convert(&v)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("expected {}, got {}", expected, v))),
        }
    }

    pub fn f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        parse(
            deserializer,
            |v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            },
            "a number",
        )
    }

    pub fn i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        parse(
            deserializer,
            |v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            },
            "an integer",
        )
    }

    pub fn string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(serde::de::Error::custom(format!(
                "expected a string, got {}",
                other
            ))),
        }
    }

    pub fn bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        parse(
            deserializer,
            |v| match v {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Some(false),
                    Some(1) => Some(true),
                    _ => None,
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                },
                _ => None,
            },
            "a boolean",
        )
    }
}

/// A `[lat, lon]` pair
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinate(
    #[serde(deserialize_with = "lenient::f64")] pub Option<f64>,
    #[serde(deserialize_with = "lenient::f64")] pub Option<f64>,
);

impl Coordinate {
    pub fn lat(&self) -> Option<f64> {
        self.0
    }

    pub fn lon(&self) -> Option<f64> {
        self.1
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteDetail {
    #[serde(default)]
    pub negocio: Option<Operator>,
    #[serde(default)]
    pub ida: Option<Direction>,
    #[serde(default)]
    pub regreso: Option<Direction>,
}

impl RouteDetail {
    /// Directions present in the document, labelled as stored in `ida_o_regreso`
    pub fn directions(&self) -> impl Iterator<Item = (&'static str, &Direction)> {
        [("ida", self.ida.as_ref()), ("regreso", self.regreso.as_ref())]
            .into_iter()
            .filter_map(|(label, dir)| dir.map(|d| (label, d)))
    }
}

/// Operating company of a route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operator {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Direction {
    #[serde(default)]
    pub horarios: Vec<Schedule>,
    #[serde(default)]
    pub path: Vec<Coordinate>,
    #[serde(default)]
    pub paraderos: Vec<Stop>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Schedule {
    #[serde(rename = "tipoDia", default, deserialize_with = "lenient::string")]
    pub tipo_dia: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub inicio: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub fin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stop {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub cod: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub num: Option<i64>,
    #[serde(default)]
    pub pos: Option<Coordinate>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub comuna: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::i64")]
    pub stop_type: Option<i64>,
    /// Kept as received; stored verbatim as a JSON string
    #[serde(default)]
    pub servicios: Vec<Value>,
    #[serde(default)]
    pub stop: Option<StopReference>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub eje: Option<String>,
    #[serde(rename = "codSimt", default, deserialize_with = "lenient::string")]
    pub cod_simt: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub distancia: Option<f64>,
}

impl Stop {
    /// Typed view of `servicios`
    pub fn services(&self) -> serde_json::Result<Vec<StopService>> {
        self.servicios.iter().map(StopService::deserialize).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopReference {
    #[serde(rename = "stopId", default, deserialize_with = "lenient::i64")]
    pub stop_id: Option<i64>,
    #[serde(rename = "stopCoordenadaX", default, deserialize_with = "lenient::f64")]
    pub x: Option<f64>,
    #[serde(rename = "stopCoordenadaY", default, deserialize_with = "lenient::f64")]
    pub y: Option<f64>,
}

/// A service calling at a stop
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopService {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub cod: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub destino: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub orden: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub color: Option<String>,
    #[serde(default)]
    pub negocio: Option<Operator>,
    #[serde(default)]
    pub recorrido: Option<ServiceRoute>,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub itinerario: Option<bool>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub codigo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceRoute {
    #[serde(default, deserialize_with = "lenient::string")]
    pub destino: Option<String>,
}
