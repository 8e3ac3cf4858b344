//! Fixed demonstration catalog shown when no real storage is reachable.

use serde_json::{json, Value};

use crate::catalog::record::{CatalogEntry, MetadataRecord, SourceLocation};

pub const DEMO_ENTRY_COUNT: usize = 5;

fn demo_records() -> [Value; DEMO_ENTRY_COUNT] {
    [
        json!({
            "table_name": "emplois_salaries_2016",
            "producer": "INSEE",
            "title": "Emplois salariés en 2016",
            "description": "Effectifs salariés par commune et secteur d'activité au 31 décembre 2016.",
            "last_updated": "2024-11-04 09:12:00",
            "columns": [
                {"name": "code_commune", "type": "varchar", "description": "Code officiel géographique"},
                {"name": "secteur", "type": "varchar", "description": ""},
                {"name": "effectif", "type": "integer", "description": "Nombre de postes salariés"}
            ],
            "data_sample": [
                {"code_commune": "75056", "secteur": "Commerce", "effectif": 152340},
                {"code_commune": "69123", "secteur": "Industrie", "effectif": 48211}
            ],
            "custom_fields": {"licence": "Licence Ouverte 2.0"}
        }),
        json!({
            "table_name": "indicateurs_climat_2022",
            "producer": "Météo France",
            "title": "Indicateurs climatiques 2022",
            "description": "Températures et précipitations annuelles par station.",
            "last_updated": "2024-12-18 16:40:00",
            "columns": [
                {"name": "station", "type": "varchar", "description": ""},
                {"name": "temperature_moyenne", "type": "numeric", "description": "En degrés Celsius"},
                {"name": "precipitations_mm", "type": "numeric", "description": ""}
            ],
            "data_sample": [
                {"station": "Lyon-Bron", "temperature_moyenne": 14.6, "precipitations_mm": 612.4},
                {"station": "Brest-Guipavas", "temperature_moyenne": 12.9, "precipitations_mm": 998.1}
            ],
            "custom_fields": {"frequence": "annuelle"}
        }),
        json!({
            "table_name": "emissions_ges_2021",
            "producer": "Citepa (GES)",
            "title": "Émissions de GES 2021",
            "description": "Inventaire national des émissions de gaz à effet de serre par secteur.",
            "last_updated": "2025-01-09 11:05:00",
            "columns": [
                {"name": "secteur", "type": "varchar", "description": ""},
                {"name": "emissions_mt_co2e", "type": "numeric", "description": "Mégatonnes équivalent CO2"}
            ],
            "data_sample": [
                {"secteur": "Transports", "emissions_mt_co2e": 126.3},
                {"secteur": "Agriculture", "emissions_mt_co2e": 76.4}
            ],
            "custom_fields": {"perimetre": "France métropolitaine et outre-mer"}
        }),
        json!({
            "table_name": "comptages_routiers_2023",
            "producer": "Cerema",
            "title": "Comptages routiers 2023",
            "description": "Trafic moyen journalier annuel sur le réseau routier national.",
            "last_updated": "2025-02-21 08:30:00",
            "columns": [
                {"name": "route", "type": "varchar", "description": ""},
                {"name": "point_comptage", "type": "geometry", "description": "Position du capteur"},
                {"name": "tmja", "type": "integer", "description": "Trafic moyen journalier annuel"},
                {"name": "date_mesure", "type": "date", "description": ""}
            ],
            "data_sample": [
                {"route": "A7", "point_comptage": "POINT(4.83 45.58)", "tmja": 74210, "date_mesure": "2023-06-15"}
            ],
            "custom_fields": {}
        }),
        json!({
            "table_name": "consommation_energie_2020",
            "producer": "ADEME",
            "title": "Consommation d'énergie des bâtiments 2020",
            "description": "Consommation finale d'énergie par usage et par type de bâtiment.",
            "last_updated": "2025-03-02 14:15:00",
            "columns": [
                {"name": "type_batiment", "type": "varchar", "description": ""},
                {"name": "usage", "type": "varchar", "description": ""},
                {"name": "consommation_gwh", "type": "numeric", "description": ""},
                {"name": "renove", "type": "boolean", "description": "Bâtiment rénové depuis 2010"}
            ],
            "data_sample": [
                {"type_batiment": "Résidentiel", "usage": "Chauffage", "consommation_gwh": 312500.0, "renove": false}
            ],
            "custom_fields": {"source": "Enquête TREMI"}
        }),
    ]
}

/// The five demonstration entries, in a fixed order, each from a distinct producer.
pub fn demo_entries() -> Vec<CatalogEntry> {
    demo_records()
        .into_iter()
        .filter_map(|value| serde_json::from_value::<MetadataRecord>(value).ok())
        .map(|record| CatalogEntry {
            producer: record.producer.clone(),
            record,
            location: SourceLocation::Demo,
            modified: None,
        })
        .collect()
}
