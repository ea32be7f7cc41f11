//! Source constants shared by the pipeline, the HTTP layer and the CLI.

/// Download area of the statistics site; sub-source file names are appended.
pub const DEFAULT_BASE_URL: &str = "http://vitibrasil.cnpuv.embrapa.br/download";

/// Landing page of the statistics site (HTML tables per option/year).
pub const SITE_INDEX_URL: &str = "http://vitibrasil.cnpuv.embrapa.br/index.php";

/// Directory holding the fallback snapshots, relative to the working directory.
pub const DEFAULT_DATA_ROOT: &str = "data";

/// Date the bundled fallback snapshots were taken.
pub const SNAPSHOT_AS_OF: &str = "2024-05-20";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

pub const DEFAULT_PAGE_START: usize = 0;
pub const DEFAULT_PAGE_LENGTH: usize = 10;
pub const DEFAULT_DRAW: u64 = 1;

// Dataset slugs (used in routes, file names and the CLI)
pub const PRODUCAO: &str = "producao";
pub const PROCESSAMENTO: &str = "processamento";
pub const COMERCIALIZACAO: &str = "comercializacao";
pub const IMPORTACAO: &str = "importacao";
pub const EXPORTACAO: &str = "exportacao";

/// Separator between the category code and the rest of a control value.
pub const CONTROL_SEPARATOR: char = '_';

// Output column names
pub const DT_ANO: &str = "DT_ANO";
pub const ID_PRODUTO: &str = "ID_PRODUTO";
pub const NM_PRODUTO: &str = "NM_PRODUTO";
pub const TIPO_PRODUTO: &str = "TIPO_PRODUTO";
pub const ID_UVA_PROCESSADA: &str = "ID_UVA_PROCESSADA";
pub const NM_UVA: &str = "NM_UVA";
pub const NM_PAIS: &str = "NM_PAIS";
pub const NM_ITEM: &str = "NM_ITEM";

/// Get all dataset slugs in presentation order
pub fn get_supported_datasets() -> Vec<&'static str> {
    vec![PRODUCAO, PROCESSAMENTO, COMERCIALIZACAO, IMPORTACAO, EXPORTACAO]
}
