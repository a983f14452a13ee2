//! GTFS historical-feed tables
//!
//! One table per staged `{table}.txt` file. Every table carries the two
//! enrichment columns appended by the batch loader.

use super::{FieldSchema, FieldType, TableSchema};

use FieldType::{Float, Integer, String as Text, Timestamp};

/// Ingestion timestamp column appended to every row
pub const CREATED_AT: &str = "created_at";

/// Load-period label column appended to every row
pub const LOAD_PERIOD: &str = "periodo_de_carga";

const fn f(name: &'static str, field_type: FieldType) -> FieldSchema {
    FieldSchema::new(name, field_type)
}

pub const AGENCY: TableSchema = TableSchema {
    name: "agency",
    fields: &[
        f("agency_id", Text),
        f("agency_name", Text),
        f("agency_url", Text),
        f("agency_timezone", Text),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const CALENDAR: TableSchema = TableSchema {
    name: "calendar",
    fields: &[
        f("service_id", Text),
        f("monday", Integer),
        f("tuesday", Integer),
        f("wednesday", Integer),
        f("thursday", Integer),
        f("friday", Integer),
        f("saturday", Integer),
        f("sunday", Integer),
        f("start_date", Text),
        f("end_date", Text),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const CALENDAR_DATES: TableSchema = TableSchema {
    name: "calendar_dates",
    fields: &[
        f("service_id", Text),
        f("date", Text),
        f("exception_type", Integer),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const FEED_INFO: TableSchema = TableSchema {
    name: "feed_info",
    fields: &[
        f("feed_publisher_name", Text),
        f("feed_publisher_url", Text),
        f("feed_lang", Text),
        f("feed_start_date", Text),
        f("feed_end_date", Text),
        f("feed_version", Text),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const FREQUENCIES: TableSchema = TableSchema {
    name: "frequencies",
    fields: &[
        f("trip_id", Text),
        f("start_time", Text),
        f("end_time", Text),
        f("headway_secs", Integer),
        f("exact_times", Integer),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const ROUTES: TableSchema = TableSchema {
    name: "routes",
    fields: &[
        f("route_id", Text),
        f("agency_id", Text),
        f("route_short_name", Text),
        f("route_long_name", Text),
        f("route_desc", Text),
        f("route_type", Text),
        f("route_url", Text),
        f("route_color", Text),
        f("route_text_color", Text),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const SHAPES: TableSchema = TableSchema {
    name: "shapes",
    fields: &[
        f("shape_id", Text),
        f("shape_pt_lat", Float),
        f("shape_pt_lon", Float),
        f("shape_pt_sequence", Integer),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const STOP_TIMES: TableSchema = TableSchema {
    name: "stop_times",
    fields: &[
        f("trip_id", Text),
        f("arrival_time", Text),
        f("departure_time", Text),
        f("stop_id", Text),
        f("stop_sequence", Integer),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const STOPS: TableSchema = TableSchema {
    name: "stops",
    fields: &[
        f("stop_id", Text),
        f("stop_code", Text),
        f("stop_name", Text),
        f("stop_lat", Float),
        f("stop_lon", Float),
        f("stop_url", Text),
        f("wheelchair_boarding", Text),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const TRANSFERS: TableSchema = TableSchema {
    name: "transfers",
    fields: &[
        f("from_stop_id", Text),
        f("to_stop_id", Text),
        f("transfer_type", Integer),
        f("min_transfer_time", Integer),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

pub const TRIPS: TableSchema = TableSchema {
    name: "trips",
    fields: &[
        f("route_id", Text),
        f("service_id", Text),
        f("trip_id", Text),
        f("trip_headsign", Text),
        f("direction_id", Integer),
        f("shape_id", Text),
        f(CREATED_AT, Timestamp),
        f(LOAD_PERIOD, Text),
    ],
};

/// Tables processed by the feed orchestrator, in processing order
pub const TABLES: &[TableSchema] = &[
    AGENCY,
    CALENDAR,
    CALENDAR_DATES,
    FEED_INFO,
    FREQUENCIES,
    ROUTES,
    SHAPES,
    STOP_TIMES,
    STOPS,
    TRANSFERS,
    TRIPS,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_eleven_unique_tables() {
        let names: HashSet<_> = TABLES.iter().map(|t| t.name).collect();
        assert_eq!(TABLES.len(), 11);
        assert_eq!(names.len(), 11);
    }

    #[test]
    fn test_every_table_ends_with_enrichment_columns() {
        for table in TABLES {
            let n = table.fields.len();
            assert_eq!(table.fields[n - 2], FieldSchema::new(CREATED_AT, Timestamp), "{}", table.name);
            assert_eq!(table.fields[n - 1], FieldSchema::new(LOAD_PERIOD, Text), "{}", table.name);
        }
    }

    #[test]
    fn test_field_names_unique_per_table() {
        for table in TABLES {
            let names: HashSet<_> = table.field_names().collect();
            assert_eq!(names.len(), table.fields.len(), "{}", table.name);
        }
    }

    #[test]
    fn test_stops_coordinates_are_float() {
        assert_eq!(STOPS.field("stop_lat").map(|f| f.field_type), Some(Float));
        assert_eq!(STOPS.field("stop_lon").map(|f| f.field_type), Some(Float));
    }
}
