use crate::constants::CONTROL_SEPARATOR;

/// Fixed code → label table for one source. Lookup is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryMapping {
    entries: &'static [(&'static str, &'static str)],
}

impl CategoryMapping {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn get(&self, code: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, label)| *label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(_, label)| *label)
    }
}

/// The category code of a control value: everything before the first `_`,
/// or the whole value when there is no separator.
pub fn control_code(control: &str) -> &str {
    let control = control.trim();
    match control.split_once(CONTROL_SEPARATOR) {
        Some((code, _)) => code,
        None => control,
    }
}

/// Map a control value to its category label. `None` means the row is dropped.
pub fn map_category(control: &str, mapping: &CategoryMapping) -> Option<&'static str> {
    mapping.get(control_code(control))
}

// Category tables per source

pub const PRODUCAO_CATEGORIES: CategoryMapping = CategoryMapping::new(&[
    ("vm", "Vinho de Mesa"),
    ("vv", "Vinho Fino de Mesa (Vinífera)"),
    ("su", "Suco"),
    ("de", "Derivados"),
]);

pub const COMERCIALIZACAO_CATEGORIES: CategoryMapping = CategoryMapping::new(&[
    ("vm", "Vinho de Mesa"),
    ("ve", "Vinho Especial"),
    ("es", "Espumantes"),
    ("su", "Suco de Uvas"),
    ("ou", "Outros Produtos"),
]);

pub const VINIFERAS_CATEGORIES: CategoryMapping =
    CategoryMapping::new(&[("ti", "Tintas"), ("br", "Brancas e Rosadas")]);

pub const AMERICANAS_CATEGORIES: CategoryMapping =
    CategoryMapping::new(&[("ti", "Tintas"), ("br", "Brancas e Rosadas")]);

pub const UVAS_DE_MESA_CATEGORIES: CategoryMapping =
    CategoryMapping::new(&[("ti", "Tintas"), ("br", "Brancas")]);

pub const SEM_CLASSE_CATEGORIES: CategoryMapping =
    CategoryMapping::new(&[("sc", "Sem classificação")]);
