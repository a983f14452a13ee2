//! Daily route transform
//!
//! Reads the route documents staged for a date and flattens each into rows of
//! the five daily tables. Rows are loaded per file and per table; a document
//! that cannot be read or parsed is recorded and the next one is processed.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use transit_common::LoadDate;

use super::models::{RouteDetail, Stop};
use crate::error::Result;
use crate::loader::BatchLoader;
use crate::registry::SchemaRegistry;
use crate::schema::daily::{HORARIOS, NEGOCIOS, PARADEROS, PATHS, SERVICIOS};
use crate::schema::Record;
use crate::storage::{ObjectStore, StagingArea};
use crate::summary::{RunSummary, TableStatus};

pub const PIPELINE_NAME: &str = "daily-transform";

fn record<const N: usize>(fields: [(&str, Value); N]) -> Record {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Rows derived from one route document, per destination table
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RouteRows {
    pub negocios: Vec<Record>,
    pub horarios: Vec<Record>,
    pub paths: Vec<Record>,
    pub paraderos: Vec<Record>,
    pub servicios: Vec<Record>,
}

impl RouteRows {
    /// (table, rows) in load order
    pub fn tables(&self) -> [(&'static str, &[Record]); 5] {
        [
            (NEGOCIOS.name, self.negocios.as_slice()),
            (HORARIOS.name, self.horarios.as_slice()),
            (PATHS.name, self.paths.as_slice()),
            (PARADEROS.name, self.paraderos.as_slice()),
            (SERVICIOS.name, self.servicios.as_slice()),
        ]
    }
}

/// Flatten one route document
pub fn derive_rows(route_id: &str, detail: &RouteDetail) -> serde_json::Result<RouteRows> {
    let mut rows = RouteRows::default();

    if let Some(op) = &detail.negocio {
        rows.negocios.push(record([
            ("negocio_id", op.id.into()),
            ("nombre", op.nombre.clone().into()),
            ("color", op.color.clone().into()),
            ("url", op.url.clone().into()),
        ]));
    }

    for (direction, dir) in detail.directions() {
        for schedule in &dir.horarios {
            rows.horarios.push(record([
                ("recorrido_id", route_id.into()),
                ("ida_o_regreso", direction.into()),
                ("tipoDia", schedule.tipo_dia.clone().into()),
                ("inicio", schedule.inicio.clone().into()),
                ("fin", schedule.fin.clone().into()),
            ]));
        }

        for point in &dir.path {
            rows.paths.push(record([
                ("recorrido_id", route_id.into()),
                ("ida_o_regreso", direction.into()),
                ("lat", point.lat().into()),
                ("lon", point.lon().into()),
            ]));
        }

        for stop in &dir.paraderos {
            rows.paraderos.push(stop_row(route_id, direction, stop)?);
            rows.servicios.extend(service_rows(stop)?);
        }
    }

    Ok(rows)
}

fn stop_row(route_id: &str, direction: &str, stop: &Stop) -> serde_json::Result<Record> {
    let reference = stop.stop.clone().unwrap_or_default();

    Ok(record([
        ("recorrido_id", route_id.into()),
        ("ida_o_regreso", direction.into()),
        ("paradero_id", stop.id.into()),
        ("cod", stop.cod.clone().into()),
        ("num", stop.num.into()),
        ("lat", stop.pos.and_then(|p| p.lat()).into()),
        ("lon", stop.pos.and_then(|p| p.lon()).into()),
        ("name", stop.name.clone().into()),
        ("comuna", stop.comuna.clone().into()),
        ("type", stop.stop_type.into()),
        ("servicios", serde_json::to_string(&stop.servicios)?.into()),
        ("stopId", reference.stop_id.into()),
        ("stopCoordenadaX", reference.x.into()),
        ("stopCoordenadaY", reference.y.into()),
        ("eje", stop.eje.clone().into()),
        ("codSimt", stop.cod_simt.clone().into()),
        ("distancia", stop.distancia.into()),
    ]))
}

fn service_rows(stop: &Stop) -> serde_json::Result<Vec<Record>> {
    Ok(stop
        .services()?
        .into_iter()
        .map(|service| {
            let operator = service.negocio.unwrap_or_default();
            let destination = service.recorrido.and_then(|r| r.destino);
            record([
                ("paradero_id", stop.id.into()),
                ("id", service.id.into()),
                ("cod", service.cod.into()),
                ("destino", service.destino.into()),
                ("orden", service.orden.into()),
                ("color", service.color.into()),
                ("negocio_nombre", operator.nombre.into()),
                ("negocio_color", operator.color.into()),
                ("recorrido_destino", destination.into()),
                ("itinerario", service.itinerario.into()),
                ("codigo", service.codigo.into()),
            ])
        })
        .collect())
}

/// Route id of a staged document: its file name without extension
pub fn route_id_from_key(key: &str) -> Option<&str> {
    let name = key.rsplit('/').next()?;
    let stem = name.strip_suffix(".json")?;
    (!stem.is_empty()).then_some(stem)
}

pub struct DailyRouteTransformer {
    storage: Arc<dyn ObjectStore>,
    registry: SchemaRegistry,
    loader: BatchLoader,
}

impl DailyRouteTransformer {
    pub fn new(storage: Arc<dyn ObjectStore>, registry: SchemaRegistry, batch_size: usize) -> Self {
        let loader = BatchLoader::new(registry.clone(), batch_size);
        Self {
            storage,
            registry,
            loader,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, date: &LoadDate) -> Result<RunSummary> {
        let mut summary = RunSummary::new(PIPELINE_NAME, *date);

        for schema in self.registry.tables() {
            summary.track(schema.name);
            match self.registry.ensure_table(schema.name).await {
                Ok(()) => summary.set_status(schema.name, TableStatus::SchemaEnsured),
                Err(e) => {
                    error!("✗ {}: could not ensure table: {}", schema.name, e);
                    summary.set_status(schema.name, TableStatus::failed(e));
                },
            }
        }

        let prefix = StagingArea::Daily.prefix(date);
        let keys = self.storage.list(&prefix).await?;
        info!("Found {} staged documents under {}", keys.len(), prefix);

        for key in keys {
            let Some(route_id) = route_id_from_key(&key) else {
                debug!("Ignoring {}", key);
                continue;
            };

            let rows = match self.read_route(&key, route_id).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Skipping {}: {}", key, e);
                    summary.record_item_failure(key.clone(), e);
                    continue;
                },
            };

            for (table, records) in rows.tables() {
                if records.is_empty() {
                    continue;
                }
                if matches!(summary.status(table), Some(TableStatus::Failed { .. })) {
                    continue;
                }
                match self.loader.load_records(table, records).await {
                    Ok(result) => summary.add_load(&result),
                    Err(e) => {
                        error!("✗ {} from {}: {}", table, key, e);
                        summary.set_status(table, TableStatus::failed(e));
                    },
                }
            }
        }

        info!("{}", summary.status_line());

        Ok(summary)
    }

    async fn read_route(&self, key: &str, route_id: &str) -> Result<RouteRows> {
        let content = self.storage.read_text(key).await?;
        let detail: RouteDetail = serde_json::from_str(&content)?;
        Ok(derive_rows(route_id, &detail)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RouteDetail {
        serde_json::from_value(json!({
            "negocio": { "id": 7, "nombre": "Metbus", "color": "#00a", "url": "http://metbus.cl" },
            "ida": {
                "horarios": [
                    { "tipoDia": "Lunes a Viernes", "inicio": "05:30", "fin": "23:00" },
                    { "tipoDia": "Sábado", "inicio": "06:00", "fin": "23:00" }
                ],
                "path": [[-33.40, -70.60], [-33.41, -70.61], [-33.42, -70.62]],
                "paraderos": [{
                    "id": 100,
                    "cod": "PA100",
                    "num": 1,
                    "pos": [-33.40, -70.60],
                    "name": "Plaza",
                    "comuna": "Santiago",
                    "type": 1,
                    "servicios": [
                        {
                            "id": 1, "cod": "506", "destino": "Maipú", "orden": 1, "color": "#f00",
                            "negocio": { "nombre": "Metbus", "color": "#00a" },
                            "recorrido": { "destino": "Maipú" },
                            "itinerario": true, "codigo": "506I"
                        },
                        {
                            "id": 2, "cod": "507", "destino": "Peñalolén", "orden": 2, "color": "#0f0",
                            "negocio": { "nombre": "Metbus", "color": "#00a" },
                            "recorrido": { "destino": "Peñalolén" },
                            "itinerario": false, "codigo": "507I"
                        }
                    ],
                    "stop": { "stopId": 9001, "stopCoordenadaX": "-33.4001", "stopCoordenadaY": "-70.6001" },
                    "eje": "Alameda",
                    "codSimt": "PA100",
                    "distancia": 0.0
                }]
            },
            "regreso": {
                "horarios": [{ "tipoDia": "Domingo", "inicio": "07:00", "fin": "22:00" }],
                "path": [[-33.42, -70.62]],
                "paraderos": []
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_derive_rows_counts() {
        let rows = derive_rows("506", &sample()).unwrap();

        assert_eq!(rows.negocios.len(), 1);
        assert_eq!(rows.horarios.len(), 3);
        assert_eq!(rows.paths.len(), 4);
        assert_eq!(rows.paraderos.len(), 1);
        assert_eq!(rows.servicios.len(), 2);
    }

    #[test]
    fn test_derive_rows_values() {
        let rows = derive_rows("506", &sample()).unwrap();

        assert_eq!(rows.negocios[0]["negocio_id"], json!(7));
        assert_eq!(rows.horarios[2]["ida_o_regreso"], "regreso");
        assert_eq!(rows.horarios[2]["recorrido_id"], "506");
        assert_eq!(rows.paths[0]["lat"], json!(-33.40));

        let stop = &rows.paraderos[0];
        assert_eq!(stop["stopCoordenadaX"], json!(-33.4001));
        assert_eq!(stop["stopCoordenadaY"], json!(-70.6001));
        assert_eq!(stop["lon"], json!(-70.60));
        let services: Vec<Value> = serde_json::from_str(stop["servicios"].as_str().unwrap()).unwrap();
        assert_eq!(services.len(), 2);

        assert_eq!(rows.servicios[1]["paradero_id"], json!(100));
        assert_eq!(rows.servicios[1]["recorrido_destino"], "Peñalolén");
        assert_eq!(rows.servicios[1]["itinerario"], json!(false));
    }

    #[test]
    fn test_derive_rows_empty_document() {
        let rows = derive_rows("506", &RouteDetail::default()).unwrap();
        assert!(rows.tables().iter().all(|(_, records)| records.is_empty()));
    }

    #[test]
    fn test_route_id_from_key() {
        assert_eq!(route_id_from_key("datos_diarios/2024-06-01/506.json"), Some("506"));
        assert_eq!(route_id_from_key("datos_diarios/2024-06-01/B02.json"), Some("B02"));
        assert_eq!(route_id_from_key("datos_diarios/2024-06-01/notes.txt"), None);
        assert_eq!(route_id_from_key("datos_diarios/2024-06-01/.json"), None);
    }
}
