//! Tables derived from the daily per-route documents

use super::{FieldSchema, FieldType, TableSchema};

use FieldType::{Boolean, Float, Integer, String as Text};

pub const NEGOCIOS: TableSchema = TableSchema {
    name: "negocios",
    fields: &[
        FieldSchema::new("negocio_id", Integer),
        FieldSchema::new("nombre", Text),
        FieldSchema::new("color", Text),
        FieldSchema::new("url", Text),
    ],
};

pub const HORARIOS: TableSchema = TableSchema {
    name: "horarios",
    fields: &[
        FieldSchema::new("recorrido_id", Text),
        FieldSchema::new("ida_o_regreso", Text),
        FieldSchema::new("tipoDia", Text),
        FieldSchema::new("inicio", Text),
        FieldSchema::new("fin", Text),
    ],
};

pub const PATHS: TableSchema = TableSchema {
    name: "paths",
    fields: &[
        FieldSchema::new("recorrido_id", Text),
        FieldSchema::new("ida_o_regreso", Text),
        FieldSchema::new("lat", Float),
        FieldSchema::new("lon", Float),
    ],
};

pub const PARADEROS: TableSchema = TableSchema {
    name: "paraderos",
    fields: &[
        FieldSchema::new("recorrido_id", Text),
        FieldSchema::new("ida_o_regreso", Text),
        FieldSchema::new("paradero_id", Integer),
        FieldSchema::new("cod", Text),
        FieldSchema::new("num", Integer),
        FieldSchema::new("lat", Float),
        FieldSchema::new("lon", Float),
        FieldSchema::new("name", Text),
        FieldSchema::new("comuna", Text),
        FieldSchema::new("type", Integer),
        FieldSchema::new("servicios", Text),
        FieldSchema::new("stopId", Integer),
        FieldSchema::new("stopCoordenadaX", Float),
        FieldSchema::new("stopCoordenadaY", Float),
        FieldSchema::new("eje", Text),
        FieldSchema::new("codSimt", Text),
        FieldSchema::new("distancia", Float),
    ],
};

pub const SERVICIOS: TableSchema = TableSchema {
    name: "servicios",
    fields: &[
        FieldSchema::new("paradero_id", Integer),
        FieldSchema::new("id", Integer),
        FieldSchema::new("cod", Text),
        FieldSchema::new("destino", Text),
        FieldSchema::new("orden", Integer),
        FieldSchema::new("color", Text),
        FieldSchema::new("negocio_nombre", Text),
        FieldSchema::new("negocio_color", Text),
        FieldSchema::new("recorrido_destino", Text),
        FieldSchema::new("itinerario", Boolean),
        FieldSchema::new("codigo", Text),
    ],
};

pub const TABLES: &[TableSchema] = &[NEGOCIOS, HORARIOS, PATHS, PARADEROS, SERVICIOS];
