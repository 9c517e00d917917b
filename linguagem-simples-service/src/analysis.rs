//! Keyword heuristics describing the outcome of a legal document.

use serde::{Deserialize, Serialize};

/// Outcome of the decision, from the citizen's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Vitoria,
    Derrota,
    Parcial,
    Indefinido,
}

/// Summary flags shown next to the simplified text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub tipo_resultado: ResultKind,
    pub tem_valores: bool,
    pub tem_prazos: bool,
    pub tem_recursos: bool,
}

// Checked in this order: "improcedente" contains "procedente" and
// "parcialmente procedente" contains both.
const PARTIAL_TERMS: &[&str] = &[
    "parcialmente procedente",
    "procedencia parcial",
    "parcialmente provido",
    "parcialmente deferido",
];

const LOSS_TERMS: &[&str] = &[
    "improcedente",
    "improvido",
    "indeferido",
    "negado provimento",
    "nega provimento",
    "extinto sem resolucao",
];

const WIN_TERMS: &[&str] = &[
    "procedente",
    "provido",
    "deferido",
    "dou provimento",
    "julgo procedente",
    "condeno o reu",
];

const AMOUNT_TERMS: &[&str] = &["r$", "reais", "valor da causa", "indenizacao"];

const DEADLINE_TERMS: &[&str] = &["prazo", "dias uteis", "no prazo de"];

const APPEAL_TERMS: &[&str] = &["recurso", "apelacao", "agravo", "embargos", "recorrer"];

/// Analyze a document and its simplification.
///
/// The outcome comes from the original text when it is conclusive, otherwise
/// from the simplified one. Flags are set when either text matches.
pub fn analyze(original: &str, simplified: &str) -> Analysis {
    let original = fold(original);
    let simplified = fold(simplified);

    let tipo_resultado = match classify(&original) {
        ResultKind::Indefinido => classify(&simplified),
        kind => kind,
    };

    let either = |check: &dyn Fn(&str) -> bool| check(&original) || check(&simplified);

    Analysis {
        tipo_resultado,
        tem_valores: either(&|t| contains_any(t, AMOUNT_TERMS)),
        tem_prazos: either(&|t| contains_any(t, DEADLINE_TERMS) || has_day_count(t)),
        tem_recursos: either(&|t| contains_any(t, APPEAL_TERMS)),
    }
}

fn classify(folded: &str) -> ResultKind {
    if contains_any(folded, PARTIAL_TERMS) {
        ResultKind::Parcial
    } else if contains_any(folded, LOSS_TERMS) {
        ResultKind::Derrota
    } else if contains_any(folded, WIN_TERMS) {
        ResultKind::Vitoria
    } else {
        ResultKind::Indefinido
    }
}

/// Percentage of characters removed, one decimal, clamped to `0..=100`.
pub fn reduction_percent(original_chars: usize, simplified_chars: usize) -> f64 {
    if original_chars == 0 {
        return 0.0;
    }
    let reduction = (1.0 - simplified_chars as f64 / original_chars as f64) * 100.0;
    (reduction.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// A number followed by "dias", e.g. "15 dias" or "15dias".
fn has_day_count(folded: &str) -> bool {
    let mut rest = folded;
    while let Some(pos) = rest.find("dias") {
        let before = rest[..pos].trim_end();
        if before.chars().last().is_some_and(|c| c.is_ascii_digit()) {
            return true;
        }
        rest = &rest[pos + "dias".len()..];
    }
    false
}

/// Lowercase and strip Portuguese diacritics.
fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_outcomes() {
        assert_eq!(
            analyze("Julgo PROCEDENTE o pedido inicial.", "").tipo_resultado,
            ResultKind::Vitoria
        );
        assert_eq!(
            analyze("Julgo improcedente o pedido.", "").tipo_resultado,
            ResultKind::Derrota
        );
        assert_eq!(
            analyze("Pedido julgado parcialmente procedente.", "").tipo_resultado,
            ResultKind::Parcial
        );
        assert_eq!(
            analyze("Pedido de tutela INDEFERIDO.", "").tipo_resultado,
            ResultKind::Derrota
        );
        assert_eq!(
            analyze("Processo extinto sem resolução do mérito.", "").tipo_resultado,
            ResultKind::Derrota
        );
        assert_eq!(
            analyze("Intime-se a parte autora.", "").tipo_resultado,
            ResultKind::Indefinido
        );
    }

    #[test]
    fn test_simplified_text_used_when_original_inconclusive() {
        let analysis = analyze("Vistos.", "O juiz deu provimento ao seu pedido: recurso provido.");
        assert_eq!(analysis.tipo_resultado, ResultKind::Vitoria);
        assert!(analysis.tem_recursos);
    }

    #[test]
    fn test_flags() {
        let analysis = analyze(
            "Condeno o réu ao pagamento de indenização de R$ 5.000,00. Prazo de 15 dias para apelação.",
            "",
        );
        assert_eq!(analysis.tipo_resultado, ResultKind::Vitoria);
        assert!(analysis.tem_valores);
        assert!(analysis.tem_prazos);
        assert!(analysis.tem_recursos);

        let none = analyze("Vistos e examinados.", "Nada a declarar.");
        assert!(!none.tem_valores);
        assert!(!none.tem_prazos);
        assert!(!none.tem_recursos);
    }

    #[test]
    fn test_day_count_detection() {
        assert!(has_day_count("cumpra em 5 dias"));
        assert!(has_day_count("em 30dias corridos"));
        assert!(!has_day_count("todos os dias"));
        assert!(!has_day_count("bons dias, 5"));
    }

    #[test]
    fn test_fold_removes_accents() {
        assert_eq!(fold("APELAÇÃO Indenização Útil"), "apelacao indenizacao util");
    }

    #[test]
    fn test_reduction_percent() {
        assert_eq!(reduction_percent(1000, 400), 60.0);
        assert_eq!(reduction_percent(3, 2), 33.3);
        assert_eq!(reduction_percent(100, 150), 0.0);
        assert_eq!(reduction_percent(0, 10), 0.0);
        assert_eq!(reduction_percent(10, 0), 100.0);
    }

    #[test]
    fn test_result_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ResultKind::Vitoria).unwrap(),
            "\"vitoria\""
        );
    }
}
