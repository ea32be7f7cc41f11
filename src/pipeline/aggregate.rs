use super::category::map_category;
use super::dataset::{CategorizedShape, Dataset, DatasetSpec, QuantityValueShape, Shape, SubSource};
use super::join::{measure_families, split_and_join};
use super::loader::SourceLoader;
use super::record::{Field, NormalizedTable};
use super::reshape::{reshape, YearColumns};
use super::table::{title_case, RawTable};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use futures::future::try_join_all;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// Loads, reshapes and labels the sub-sources of a dataset into one table.
pub struct Pipeline {
    loader: SourceLoader,
}

impl Pipeline {
    pub fn new(loader: SourceLoader) -> Self {
        Self { loader }
    }

    /// Rebuild the full normalized table of `dataset` from its sources.
    #[instrument(skip_all, fields(dataset = %dataset))]
    pub async fn preprocess(&self, dataset: Dataset) -> Result<NormalizedTable> {
        let spec = dataset.spec();
        let started = Instant::now();

        match self.aggregate(spec, &spec.source_keys()).await {
            Ok(table) => {
                let secs = started.elapsed().as_secs_f64();
                metrics::pipeline::run_success(dataset.slug(), table.len(), secs);
                info!(rows = table.len(), elapsed_secs = secs, "Preprocessing finished");
                Ok(table)
            }
            Err(e) => {
                metrics::pipeline::run_error(dataset.slug());
                if e.is_integrity_violation() {
                    error!(error = %e, "Data integrity violation in upstream data");
                } else {
                    error!(error = %e, "Preprocessing failed");
                }
                Err(e)
            }
        }
    }

    /// Load every requested sub-source concurrently, then shape, tag and
    /// concatenate them in the requested order. Unknown keys fail before any
    /// fetch is issued.
    pub async fn aggregate(&self, spec: &DatasetSpec, source_keys: &[&str]) -> Result<NormalizedTable> {
        let sources = source_keys
            .iter()
            .map(|key| spec.sub_source(key))
            .collect::<Result<Vec<_>>>()?;

        let required = &spec.required_columns();
        let loads = sources.iter().map(|source| async move {
            let url = self.loader.remote_url(source.remote_file);
            self.loader
                .load(source.key, &url, source.local_file, source.separator, required)
                .await
        });
        let loaded = try_join_all(loads).await?;

        let mut table = NormalizedTable::new(spec.columns);
        for (source, loaded) in sources.iter().zip(loaded) {
            let shaped = shape_source(spec, source, &loaded.table)?;
            debug!(source = source.key, rows = shaped.len(), "Shaped sub-source");
            table.extend(shaped);
        }

        if let Some((id_column, source_column)) = spec.provenance {
            table.check_provenance(id_column, source_column)?;
        }
        if let Some((id_column, name_column)) = spec.identity {
            table.check_identity(id_column, name_column)?;
        }

        table.sort_by_columns(spec.sort_columns);
        Ok(table)
    }
}

/// Turn one raw sub-source table into rows of the dataset's output columns.
pub fn shape_source(spec: &DatasetSpec, source: &SubSource, raw: &RawTable) -> Result<NormalizedTable> {
    match &spec.shape {
        Shape::Categorized(shape) => shape_categorized(spec, shape, source, raw),
        Shape::QuantityValue(shape) => shape_quantity_value(spec, shape, source, raw),
    }
}

fn shape_categorized(
    spec: &DatasetSpec,
    shape: &CategorizedShape,
    source: &SubSource,
    raw: &RawTable,
) -> Result<NormalizedTable> {
    let mapping = source.categories.ok_or_else(|| {
        PipelineError::Configuration(format!("Source '{}' has no category mapping", source.key))
    })?;

    let long = reshape(
        raw,
        &[shape.id_column, shape.name_column, shape.control_column],
        YearColumns::Remaining,
    )
    .map_err(|missing| missing.for_source(source.key))?;

    let mut out = NormalizedTable::new(spec.columns);
    let mut unmapped = 0usize;
    for row in long.rows {
        let Some(category) = map_category(&row.ids[2], &mapping) else {
            unmapped += 1;
            continue;
        };
        let id = if shape.tag_ids {
            format!("{}_{}", row.ids[0], source.tag)
        } else {
            row.ids[0].clone()
        };

        let mut fields = vec![
            Field::Text(id),
            Field::Text(title_case(&row.ids[1])),
            Field::Text(row.year),
            Field::Measure(row.value),
            Field::text(category),
        ];
        if shape.with_provenance {
            fields.push(Field::text(source.key));
        }
        out.push(fields);
    }

    if unmapped > 0 {
        debug!(source = source.key, unmapped, "Dropped rows without a known category");
    }
    metrics::pipeline::rows_unmapped(source.key, unmapped);
    Ok(out)
}

fn shape_quantity_value(
    spec: &DatasetSpec,
    shape: &QuantityValueShape,
    source: &SubSource,
    raw: &RawTable,
) -> Result<NormalizedTable> {
    let (quantities, values) = measure_families(raw);
    let joined = split_and_join(raw, &[shape.key_column], &quantities, &values)
        .map_err(|missing| missing.for_source(source.key))?;

    let mut out = NormalizedTable::new(spec.columns);
    for row in joined.rows {
        let key = row.keys.into_iter().next().unwrap_or_default();
        out.push(vec![
            Field::Text(key),
            Field::Text(row.year),
            Field::text(source.key),
            Field::Measure(row.quantity),
            Field::Measure(row.value),
        ]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{FetchedPayload, RemoteFetcher};
    use crate::pipeline::dataset::{
        COMERCIALIZACAO_SPEC, EXPORTACAO_SPEC, IMPORTACAO_SPEC, PROCESSAMENTO_SPEC, PRODUCAO_SPEC,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// Serves fixed bodies by file name; anything else fails.
    struct MapFetcher(HashMap<String, String>);

    #[async_trait]
    impl RemoteFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<FetchedPayload, String> {
            let file = url.rsplit('/').next().unwrap_or_default();
            self.0
                .get(file)
                .map(|body| FetchedPayload {
                    status: 200,
                    bytes: body.as_bytes().to_vec(),
                    content_type: "text/csv".to_string(),
                })
                .ok_or_else(|| format!("no route for {}", url))
        }
    }

    fn pipeline(files: &[(&str, &str)]) -> (Pipeline, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MapFetcher(
            files
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_string()))
                .collect(),
        );
        let loader = SourceLoader::new(Arc::new(fetcher), "http://example.test", dir.path());
        (Pipeline::new(loader), dir)
    }

    #[test]
    fn test_producao_example_row() {
        let raw = RawTable::new(
            strings(&["id", "produto", "control", "2020", "2021"]),
            vec![strings(&["1", "produto1", "vm_produto1", "100", "150"])],
        );
        let source = &PRODUCAO_SPEC.sources[0];

        let table = shape_source(&PRODUCAO_SPEC, source, &raw).unwrap();

        assert_eq!(
            table.columns,
            strings(&["ID_PRODUTO", "NM_PRODUTO", "DT_ANO", "VR_PRODUCAO_L", "TIPO_PRODUTO"])
        );
        assert_eq!(
            table.rows,
            vec![
                vec![
                    Field::text("1"),
                    Field::text("Produto1"),
                    Field::text("2020"),
                    Field::Measure(Some(100.0)),
                    Field::text("Vinho de Mesa"),
                ],
                vec![
                    Field::text("1"),
                    Field::text("Produto1"),
                    Field::text("2021"),
                    Field::Measure(Some(150.0)),
                    Field::text("Vinho de Mesa"),
                ],
            ]
        );
    }

    #[test]
    fn test_comercializacao_drops_unmapped_rows() {
        let raw = RawTable::new(
            strings(&["id", "Produto", "control", "2020", "2021"]),
            vec![
                strings(&["1", "Produto1", "vm_1", "500", "700"]),
                strings(&["2", "Produto2", "ve_1", "600", "800"]),
                strings(&["3", "Produto3", "xx_1", "100", "200"]),
            ],
        );
        let source = &COMERCIALIZACAO_SPEC.sources[0];

        let table = shape_source(&COMERCIALIZACAO_SPEC, source, &raw).unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(table.distinct("ID_PRODUTO"), vec!["1", "2"]);
        assert_eq!(table.distinct("TIPO_PRODUTO"), vec!["Vinho de Mesa", "Vinho Especial"]);
    }

    #[test]
    fn test_processamento_tags_ids_and_records_grape_type() {
        let raw = RawTable::new(
            strings(&["id", "control", "cultivar", "2020", "2021"]),
            vec![
                strings(&["1", "ti_control", "cultivar1", "100", "150"]),
                strings(&["2", "br_control", "cultivar2", "200", "250"]),
            ],
        );
        let source = PROCESSAMENTO_SPEC.sub_source("Viniferas").unwrap();

        let table = shape_source(&PROCESSAMENTO_SPEC, source, &raw).unwrap();

        assert_eq!(table.distinct("ID_UVA_PROCESSADA"), vec!["1_viniferas", "2_viniferas"]);
        assert_eq!(table.distinct("CD_TIPO_VINHO"), vec!["Tintas", "Brancas e Rosadas"]);
        assert_eq!(table.distinct("CD_TIPO_UVA"), vec!["Viniferas"]);
        assert_eq!(table.distinct("NM_UVA"), vec!["Cultivar1", "Cultivar2"]);
    }

    #[test]
    fn test_exportacao_sub_source_joins_measures() {
        let raw = RawTable::new(
            strings(&["Id", "País", "2020", "2020.1"]),
            vec![strings(&["1", "Brasil", "100", "1000"])],
        );
        let source = EXPORTACAO_SPEC.sub_source("Vinhos").unwrap();

        let table = shape_source(&EXPORTACAO_SPEC, source, &raw).unwrap();

        assert_eq!(
            table.columns,
            strings(&["NM_PAIS", "DT_ANO", "NM_ITEM", "QTD_EXPORTADO_KG", "VL_VALOR_EXPORTADO_USD"])
        );
        assert_eq!(
            table.rows,
            vec![vec![
                Field::text("Brasil"),
                Field::text("2020"),
                Field::text("Vinhos"),
                Field::Measure(Some(100.0)),
                Field::Measure(Some(1000.0)),
            ]]
        );
    }

    #[test]
    fn test_missing_column_names_the_source() {
        let raw = RawTable::new(strings(&["id", "control", "2020"]), vec![]);
        let source = PROCESSAMENTO_SPEC.sub_source("Americanas").unwrap();

        let err = shape_source(&PROCESSAMENTO_SPEC, source, &raw).unwrap_err();

        match err {
            PipelineError::MissingColumn { source_key, column } => {
                assert_eq!(source_key, "Americanas");
                assert_eq!(column, "cultivar");
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_aggregate_unknown_key_is_configuration_error() {
        let (pipeline, _dir) = pipeline(&[]);

        let err = pipeline
            .aggregate(&EXPORTACAO_SPEC, &["Vinhos", "Inexistente"])
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_aggregate_concatenates_and_sorts_trade_sources() {
        let (pipeline, _dir) = pipeline(&[
            ("ExpVinho.csv", "Id;País;2020;2020\n1;França;100;1000\n"),
            ("ExpSuco.csv", "Id;País;2020;2020\n2;Brasil;200;1200\n"),
        ]);

        let table = pipeline
            .aggregate(&EXPORTACAO_SPEC, &["Vinhos", "Sucos"])
            .await
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.distinct("NM_PAIS"), vec!["Brasil", "França"]);
        assert_eq!(table.distinct("NM_ITEM"), vec!["Sucos", "Vinhos"]);
    }

    #[tokio::test]
    async fn test_preprocess_processamento_keeps_sources_apart() {
        let body = "id;control;cultivar;2020;2021\n1;ti_x;Isabel;10;20\n2;br_x;Niagara;30;40\n";
        let tab_body = body.replace(';', "\t");
        let sem_classe = "id\tcontrol\tcultivar\t2020\t2021\n1\tsc_x\tOutras\t5\t6\n";
        let (pipeline, _dir) = pipeline(&[
            ("ProcessaViniferas.csv", body),
            ("ProcessaAmericanas.csv", tab_body.as_str()),
            ("ProcessaMesa.csv", tab_body.as_str()),
            ("ProcessaSemClasse.csv", sem_classe),
        ]);

        let table = pipeline.preprocess(Dataset::Processamento).await.unwrap();

        // 2 rows x 2 years for three sources, 1 row x 2 years for the last
        assert_eq!(table.len(), 14);
        let ids = table.distinct("ID_UVA_PROCESSADA");
        assert!(ids.contains(&"1_viniferas".to_string()));
        assert!(ids.contains(&"1_americanas".to_string()));
        assert!(ids.contains(&"1_uvas_de_mesa".to_string()));
        assert!(ids.contains(&"1_sem_classe".to_string()));
        assert!(table.check_identity("ID_UVA_PROCESSADA", "NM_UVA").is_ok());
    }

    #[tokio::test]
    async fn test_preprocess_importacao_covers_every_item() {
        let body = "Id;País;2020;2020\n1;Chile;10;100\n";
        let files: Vec<(&str, &str)> = IMPORTACAO_SPEC
            .sources
            .iter()
            .map(|s| (s.remote_file, body))
            .collect();
        let (pipeline, _dir) = pipeline(&files);

        let table = pipeline.preprocess(Dataset::Importacao).await.unwrap();

        assert_eq!(table.len(), IMPORTACAO_SPEC.sources.len());
        let mut items = table.distinct("NM_ITEM");
        items.sort();
        let mut expected = IMPORTACAO_SPEC.source_keys();
        expected.sort();
        assert_eq!(items, expected);
    }

    #[tokio::test]
    async fn test_preprocess_rejects_identifier_with_two_names() {
        let (pipeline, _dir) = pipeline(&[(
            "Producao.csv",
            "id;produto;control;2020\n1;Tinto;vm_Tinto;10\n1;Branco;vm_Branco;20\n",
        )]);

        let err = pipeline.preprocess(Dataset::Producao).await.unwrap_err();

        assert!(matches!(err, PipelineError::IdentityViolation { ref id, .. } if id == "1"));
    }

    #[tokio::test]
    async fn test_preprocess_without_any_source_is_unavailable() {
        let (pipeline, _dir) = pipeline(&[]);

        let err = pipeline.preprocess(Dataset::Comercializacao).await.unwrap_err();

        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }
}
