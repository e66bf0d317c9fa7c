//! Versioned rule set for lab-report parsing.
//!
//! Every word list the normalizer, segmenter and parser consult lives here,
//! so a layout fix is a one-place change. Bump `RULESET_VERSION` whenever a
//! list changes meaning; it is reported with every deterministic parse.

/// Current rule set version.
pub const RULESET_VERSION: &str = "2025.1";

/// Column labels naming the analyte column. A header needs one of these.
pub const NAME_HEADER_WORDS: &[&str] = &[
    "analito", "analitos", "prueba", "pruebas", "examen", "examenes", "exámenes",
    "estudio", "determinacion", "determinación", "determinaciones", "parametro",
    "parámetro", "parametros", "parámetros", "analisis", "análisis", "test",
    "analyte", "descripcion", "descripción",
];

/// Column labels for the result column.
pub const RESULT_HEADER_WORDS: &[&str] = &["resultado", "resultados", "valor", "result", "value"];

/// Column labels for the reference-range column.
pub const REFERENCE_HEADER_WORDS: &[&str] = &[
    "referencia", "referencias", "rango", "rangos", "intervalo", "valores",
    "reference", "range", "normales",
];

/// Column labels for the unit column.
pub const UNIT_HEADER_WORDS: &[&str] = &["unidad", "unidades", "unit", "units", "u.m."];

/// Administrative or disclaimer phrases that close a table region.
/// Matched as lowercase substrings.
pub const FOOTER_PHRASES: &[&str] = &[
    "validado por",
    "verificado por",
    "firma y sello",
    "responsable técnico",
    "responsable tecnico",
    "este informe",
    "deben ser interpretados",
    "resultados validados",
    "fin del informe",
    "impreso el",
    "página ",
    "pagina ",
    "documento generado",
];

/// Prefixes of patient/administrative metadata lines. Matched against the
/// lowercase line start.
pub const METADATA_PREFIXES: &[&str] = &[
    "paciente", "nombre", "edad", "sexo", "fecha", "médico", "medico", "doctor",
    "dr.", "dra.", "dni", "rut", "historia clínica", "historia clinica", "n° orden",
    "nº orden", "orden", "procedencia", "hora", "teléfono", "telefono", "dirección",
    "direccion", "muestra",
];

/// Assay-method vocabulary stripped from analyte names.
pub const METHOD_WORDS: &[&str] = &[
    "CLIA", "ECLIA", "ELISA", "ENZIMATICO", "ENZIMÁTICO", "COLORIMETRICO",
    "COLORIMÉTRICO", "CINETICO", "CINÉTICO", "CINETICA", "CINÉTICA",
    "INMUNOTURBID.", "INMUNOTURBIDIMETRIA", "INMUNOTURBIDIMETRÍA", "CALCULO",
    "CÁLCULO", "CALCULADO", "QUIMIOLUMINISCENCIA", "ISE", "HPLC", "IMPEDANCIA",
    "CITOMETRIA", "CITOMETRÍA", "ESPECTROFOTOMETRIA", "ESPECTROFOTOMETRÍA",
];

/// Names that are never analytes: column headers, metadata labels and
/// section titles the permissive segmenter lets through.
pub const BANNED_NAMES: &[&str] = &[
    "RESULTADO", "RESULTADOS", "VALOR", "VALORES", "UNIDAD", "UNIDADES",
    "REFERENCIA", "VALORES DE REFERENCIA", "VALOR DE REFERENCIA", "RANGO",
    "RANGO DE REFERENCIA", "INTERVALO DE REFERENCIA", "EXAMEN", "PRUEBA",
    "ANALITO", "DETERMINACION", "DETERMINACIÓN", "METODO", "MÉTODO",
    "HEMOGRAMA", "BIOQUIMICA", "BIOQUÍMICA", "ORINA", "SEDIMENTO",
    "PERFIL LIPIDICO", "PERFIL LIPÍDICO", "HORMONAS", "SEROLOGIA", "SEROLOGÍA",
    "TOTAL",
];

/// Name prefixes that mark patient metadata rather than an analyte.
pub const BANNED_NAME_PREFIXES: &[&str] = &[
    "PACIENTE", "NOMBRE", "EDAD", "SEXO", "FECHA", "DNI", "RUT", "ORDEN",
    "N° ORDEN", "HORA", "PAGINA", "PÁGINA", "MEDICO", "MÉDICO", "DR.", "TELEFONO",
    "TELÉFONO",
];

/// Unit tokens recognized at the end of a row. Compared case-insensitively.
pub const KNOWN_UNITS: &[&str] = &[
    "%", "mg/dl", "g/dl", "g/l", "mg/l", "µg/dl", "µg/l", "ng/ml", "pg/ml", "pg",
    "fl", "mmol/l", "µmol/l", "meq/l", "mui/ml", "µui/ml", "uui/ml", "ui/l", "u/l",
    "ui/ml", "iu/l", "mm/h", "mm/hr", "seg", "s", "x10^3/µl", "x10^6/µl",
    "10^3/µl", "10^6/µl", "/µl", "cel/µl", "mil/mm3", "/mm3", "mm3", "g%",
    "ng/dl", "µg/ml", "kui/l", "mosm/kg", "ratio", "inr",
];

/// Qualitative result values, longest first so `NO REACTIVO` wins over
/// `REACTIVO`.
pub const QUALITATIVE_VALUES: &[&str] = &[
    "NO REACTIVO", "NO DETECTADO", "NEGATIVO", "POSITIVO", "REACTIVO",
    "DETECTADO", "AUSENTE", "AUSENTES", "PRESENTE", "PRESENTES", "TRAZAS",
    "ESCASOS", "ABUNDANTES",
];

/// Keywords marking a line that carries the collection/report date.
pub const DATE_KEYWORDS: &[&str] = &["fecha", "date", "toma", "emisión", "emision", "recepción", "recepcion"];

/// Markers of a birth date; such lines never carry the collection date.
pub const BIRTH_DATE_MARKERS: &[&str] = &["nacimiento", "nac.", "f. nac", "f.nac", "birth"];

/// Keyword marking the laboratory name line. Matched against whole words;
/// a word may extend the keyword (`laboratorios`) unless it ends in `.`.
pub const LAB_NAME_KEYWORDS: &[&str] = &["laboratorio", "laboratory", "lab."];

/// Case-insensitive membership test against one of the lists above.
pub fn contains_ci(list: &[&str], token: &str) -> bool {
    let lower = token.to_lowercase();
    list.iter().any(|w| w.to_lowercase() == lower)
}

/// True when the token is an assay-method word.
pub fn is_method_word(token: &str) -> bool {
    let upper = token.to_uppercase();
    METHOD_WORDS.iter().any(|w| *w == upper)
}
