//! The five published datasets, each described by one configuration record
//! that drives the shared preprocessing pipeline.

use super::category::{
    CategoryMapping, AMERICANAS_CATEGORIES, COMERCIALIZACAO_CATEGORIES, PRODUCAO_CATEGORIES,
    SEM_CLASSE_CATEGORIES, UVAS_DE_MESA_CATEGORIES, VINIFERAS_CATEGORIES,
};
use super::loader::RequiredColumns;
use crate::constants::{
    COMERCIALIZACAO, DT_ANO, EXPORTACAO, ID_PRODUTO, ID_UVA_PROCESSADA, IMPORTACAO, NM_ITEM,
    NM_PAIS, NM_PRODUTO, NM_UVA, PROCESSAMENTO, PRODUCAO, TIPO_PRODUTO,
};
use crate::error::{PipelineError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dataset {
    Producao,
    Processamento,
    Comercializacao,
    Importacao,
    Exportacao,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::Producao,
        Dataset::Processamento,
        Dataset::Comercializacao,
        Dataset::Importacao,
        Dataset::Exportacao,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Dataset::Producao => PRODUCAO,
            Dataset::Processamento => PROCESSAMENTO,
            Dataset::Comercializacao => COMERCIALIZACAO,
            Dataset::Importacao => IMPORTACAO,
            Dataset::Exportacao => EXPORTACAO,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Dataset::Producao => "Produção",
            Dataset::Processamento => "Processamento",
            Dataset::Comercializacao => "Comercialização",
            Dataset::Importacao => "Importação",
            Dataset::Exportacao => "Exportação",
        }
    }

    /// Fields the HTTP layer accepts as equality filters.
    pub fn filter_fields(&self) -> &'static [&'static str] {
        match self {
            Dataset::Producao => &[ID_PRODUTO],
            Dataset::Processamento => &[ID_UVA_PROCESSADA],
            Dataset::Comercializacao => &[NM_PRODUTO],
            Dataset::Importacao | Dataset::Exportacao => &[NM_ITEM, NM_PAIS],
        }
    }

    pub fn spec(&self) -> &'static DatasetSpec {
        match self {
            Dataset::Producao => &PRODUCAO_SPEC,
            Dataset::Processamento => &PROCESSAMENTO_SPEC,
            Dataset::Comercializacao => &COMERCIALIZACAO_SPEC,
            Dataset::Importacao => &IMPORTACAO_SPEC,
            Dataset::Exportacao => &EXPORTACAO_SPEC,
        }
    }

    pub fn csv_file_name(&self) -> String {
        format!("{}.csv", self.slug())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.slug() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                format!(
                    "unknown dataset '{}' (expected one of: {})",
                    s,
                    crate::constants::get_supported_datasets().join(", ")
                )
            })
    }
}

/// One remote file and its snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSource {
    /// Human-readable key; becomes the provenance value in the output.
    pub key: &'static str,
    /// Suffix appended to raw ids from this source.
    pub tag: &'static str,
    pub remote_file: &'static str,
    /// Snapshot path relative to the data root
    pub local_file: &'static str,
    pub separator: u8,
    pub categories: Option<CategoryMapping>,
}

/// Wide table with one row per entity and a control column carrying the
/// category code. Output row: id, name, year, measure, category
/// [, source key].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategorizedShape {
    pub id_column: &'static str,
    pub name_column: &'static str,
    pub control_column: &'static str,
    /// Append `_<tag>` to raw ids (sources share overlapping codes).
    pub tag_ids: bool,
    /// Append the source key as the last column.
    pub with_provenance: bool,
}

/// Wide table with a quantity and a value column per year. Output row:
/// key, year, source key, quantity, value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantityValueShape {
    pub key_column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Categorized(CategorizedShape),
    QuantityValue(QuantityValueShape),
}

#[derive(Debug, PartialEq)]
pub struct DatasetSpec {
    pub dataset: Dataset,
    pub sources: &'static [SubSource],
    pub shape: Shape,
    pub columns: &'static [&'static str],
    pub sort_columns: &'static [&'static str],
    /// (identifier, name) columns that must be one-to-one
    pub identity: Option<(&'static str, &'static str)>,
    /// (identifier, source) columns that must be one-to-one
    pub provenance: Option<(&'static str, &'static str)>,
}

impl DatasetSpec {
    pub fn sub_source(&self, key: &str) -> Result<&'static SubSource> {
        self.sources.iter().find(|s| s.key == key).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "No endpoint configured for {} source '{}'",
                self.dataset, key
            ))
        })
    }

    pub fn source_keys(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.key).collect()
    }

    /// Columns every sub-source table needs before it can be shaped.
    pub fn required_columns(&self) -> RequiredColumns {
        match &self.shape {
            Shape::Categorized(shape) => {
                RequiredColumns::Named(vec![shape.id_column, shape.name_column, shape.control_column])
            }
            Shape::QuantityValue(shape) => RequiredColumns::KeyWithYearPairs(shape.key_column),
        }
    }
}

const SEMICOLON: u8 = b';';
const TAB: u8 = b'\t';

pub static PRODUCAO_SPEC: DatasetSpec = DatasetSpec {
    dataset: Dataset::Producao,
    sources: &[SubSource {
        key: "Producao",
        tag: "producao",
        remote_file: "Producao.csv",
        local_file: "producao_vinho/Producao.csv",
        separator: SEMICOLON,
        categories: Some(PRODUCAO_CATEGORIES),
    }],
    shape: Shape::Categorized(CategorizedShape {
        id_column: "id",
        name_column: "produto",
        control_column: "control",
        tag_ids: false,
        with_provenance: false,
    }),
    columns: &[ID_PRODUTO, NM_PRODUTO, DT_ANO, "VR_PRODUCAO_L", TIPO_PRODUTO],
    sort_columns: &[ID_PRODUTO, DT_ANO],
    identity: Some((ID_PRODUTO, NM_PRODUTO)),
    provenance: None,
};

pub static PROCESSAMENTO_SPEC: DatasetSpec = DatasetSpec {
    dataset: Dataset::Processamento,
    sources: &[
        SubSource {
            key: "Viniferas",
            tag: "viniferas",
            remote_file: "ProcessaViniferas.csv",
            local_file: "processamento_vinho/ProcessaViniferas.csv",
            separator: SEMICOLON,
            categories: Some(VINIFERAS_CATEGORIES),
        },
        SubSource {
            key: "Americanas",
            tag: "americanas",
            remote_file: "ProcessaAmericanas.csv",
            local_file: "processamento_vinho/ProcessaAmericanas.csv",
            separator: TAB,
            categories: Some(AMERICANAS_CATEGORIES),
        },
        SubSource {
            key: "Uvas de mesa",
            tag: "uvas_de_mesa",
            remote_file: "ProcessaMesa.csv",
            local_file: "processamento_vinho/ProcessaMesa.csv",
            separator: TAB,
            categories: Some(UVAS_DE_MESA_CATEGORIES),
        },
        SubSource {
            key: "Sem Classe",
            tag: "sem_classe",
            remote_file: "ProcessaSemClasse.csv",
            local_file: "processamento_vinho/ProcessaSemclass.csv",
            separator: TAB,
            categories: Some(SEM_CLASSE_CATEGORIES),
        },
    ],
    shape: Shape::Categorized(CategorizedShape {
        id_column: "id",
        name_column: "cultivar",
        control_column: "control",
        tag_ids: true,
        with_provenance: true,
    }),
    columns: &[
        ID_UVA_PROCESSADA,
        NM_UVA,
        DT_ANO,
        "QT_UVAS_PROCESSADAS_KG",
        "CD_TIPO_VINHO",
        "CD_TIPO_UVA",
    ],
    sort_columns: &[ID_UVA_PROCESSADA, DT_ANO],
    identity: Some((ID_UVA_PROCESSADA, NM_UVA)),
    provenance: Some((ID_UVA_PROCESSADA, "CD_TIPO_UVA")),
};

pub static COMERCIALIZACAO_SPEC: DatasetSpec = DatasetSpec {
    dataset: Dataset::Comercializacao,
    sources: &[SubSource {
        key: "Comercio",
        tag: "comercio",
        remote_file: "Comercio.csv",
        local_file: "comercializacao_vinho/Comercio.csv",
        separator: SEMICOLON,
        categories: Some(COMERCIALIZACAO_CATEGORIES),
    }],
    shape: Shape::Categorized(CategorizedShape {
        id_column: "id",
        name_column: "Produto",
        control_column: "control",
        tag_ids: false,
        with_provenance: false,
    }),
    columns: &[ID_PRODUTO, NM_PRODUTO, DT_ANO, "VR_COMERCIALIZACAO_L", TIPO_PRODUTO],
    sort_columns: &[ID_PRODUTO, DT_ANO],
    identity: Some((ID_PRODUTO, NM_PRODUTO)),
    provenance: None,
};

pub static IMPORTACAO_SPEC: DatasetSpec = DatasetSpec {
    dataset: Dataset::Importacao,
    sources: &[
        trade_source("Vinhos", "ImpVinhos.csv", "importacao/ImpVinhos.csv"),
        trade_source("Sucos", "ImpSuco.csv", "importacao/ImpSuco.csv"),
        trade_source("Espumantes", "ImpEspumantes.csv", "importacao/ImpEspumantes.csv"),
        trade_source("Frescas", "ImpFrescas.csv", "importacao/ImpFrescas.csv"),
        trade_source("Passas", "ImpPassas.csv", "importacao/ImpPassas.csv"),
    ],
    shape: Shape::QuantityValue(QuantityValueShape { key_column: "País" }),
    columns: &[NM_PAIS, DT_ANO, NM_ITEM, "QTD_IMPORTADO_KG", "VL_VALOR_IMPORTADO_USD"],
    sort_columns: &[NM_PAIS, DT_ANO],
    identity: None,
    provenance: None,
};

pub static EXPORTACAO_SPEC: DatasetSpec = DatasetSpec {
    dataset: Dataset::Exportacao,
    sources: &[
        trade_source("Vinhos", "ExpVinho.csv", "exportacao/ExpVinho.csv"),
        trade_source("Sucos", "ExpSuco.csv", "exportacao/ExpSuco.csv"),
        trade_source("Espumantes", "ExpEspumantes.csv", "exportacao/ExpEspumantes.csv"),
        trade_source("Uvas", "ExpUva.csv", "exportacao/ExpUva.csv"),
    ],
    shape: Shape::QuantityValue(QuantityValueShape { key_column: "País" }),
    columns: &[NM_PAIS, DT_ANO, NM_ITEM, "QTD_EXPORTADO_KG", "VL_VALOR_EXPORTADO_USD"],
    sort_columns: &[NM_PAIS, DT_ANO],
    identity: None,
    provenance: None,
};

// Import/export feeds carry a country code column whose meaning differs
// between feeds; the source key identifies the item instead.
const fn trade_source(
    key: &'static str,
    remote_file: &'static str,
    local_file: &'static str,
) -> SubSource {
    SubSource {
        key,
        tag: key,
        remote_file,
        local_file,
        separator: SEMICOLON,
        categories: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_round_trip() {
        for dataset in Dataset::ALL {
            assert_eq!(dataset.slug().parse::<Dataset>().unwrap(), dataset);
            assert_eq!(dataset.spec().dataset, dataset);
        }
        assert!("vendas".parse::<Dataset>().is_err());
    }

    #[test]
    fn test_filter_fields_are_output_columns() {
        for dataset in Dataset::ALL {
            let columns = dataset.spec().columns;
            for field in dataset.filter_fields() {
                assert!(columns.contains(field), "{} lacks {}", dataset, field);
            }
        }
    }

    #[test]
    fn test_unknown_sub_source_is_configuration_error() {
        let err = EXPORTACAO_SPEC.sub_source("Inexistente").unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(EXPORTACAO_SPEC.sub_source("Uvas").unwrap().remote_file, "ExpUva.csv");
    }

    #[test]
    fn test_processing_sources_have_distinct_tags() {
        let mut tags: Vec<&str> = PROCESSAMENTO_SPEC.sources.iter().map(|s| s.tag).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), PROCESSAMENTO_SPEC.sources.len());
    }

    #[test]
    fn test_categorized_sources_have_mappings() {
        for dataset in Dataset::ALL {
            let spec = dataset.spec();
            if let Shape::Categorized(_) = spec.shape {
                assert!(spec.sources.iter().all(|s| s.categories.is_some()));
            }
        }
    }

    #[test]
    fn test_required_columns_follow_shape() {
        assert_eq!(
            PROCESSAMENTO_SPEC.required_columns(),
            RequiredColumns::Named(vec!["id", "cultivar", "control"])
        );
        assert_eq!(
            IMPORTACAO_SPEC.required_columns(),
            RequiredColumns::KeyWithYearPairs("País")
        );
    }
}
