//! Prompt template for plain-language rewriting of legal documents.

/// Section headings the model is asked to produce, in order.
pub const SECTION_ICONS: [&str; 7] = ["📊", "📑", "⚖️", "💰", "📅", "⚠️", "💡"];

pub const SYSTEM_PROMPT: &str = "Você é um especialista em Linguagem Simples aplicada ao Direito \
brasileiro. Sua tarefa é reescrever documentos jurídicos para que qualquer cidadão, sem formação \
jurídica, entenda o que aconteceu e o que precisa fazer. Use frases curtas, voz ativa e palavras \
do dia a dia. Explique termos técnicos entre parênteses na primeira vez que aparecerem. Nunca \
invente fatos, valores, datas ou nomes que não estejam no documento. Se uma informação não \
constar do documento, diga que ela não foi informada. Responda sempre em português do Brasil.";

/// Build the user prompt for a document.
pub fn build_simplification_prompt(text: &str) -> String {
    format!(
        "Reescreva o documento jurídico abaixo em linguagem simples, organizado nas seções a seguir. \
Comece cada seção em uma nova linha com o ícone e o título exatamente como indicado. Use \"•\" para listas.

📊 RESUMO GERAL
Em até três frases, explique o que aconteceu.

📑 QUE DOCUMENTO É ESTE
Diga o tipo de documento (sentença, decisão, despacho, acórdão, petição, contrato etc.) e quem o emitiu.

⚖️ DECISÃO
Explique o que foi decidido e quem ganhou, quem perdeu ou se o resultado foi parcial.

💰 VALORES
Liste valores em dinheiro, custas, honorários ou indenizações. Se não houver, escreva \"Nenhum valor mencionado\".

📅 PRAZOS
Liste prazos e datas importantes. Se não houver, escreva \"Nenhum prazo mencionado\".

⚠️ PONTOS DE ATENÇÃO
Destaque riscos, obrigações e consequências de não agir.

💡 PRÓXIMOS PASSOS
Explique o que a pessoa pode ou deve fazer agora, incluindo a possibilidade de recurso quando houver.

DOCUMENTO:
\"\"\"
{}
\"\"\"",
        text.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_all_sections_and_text() {
        let prompt = build_simplification_prompt("  Julgo procedente o pedido.  ");

        for icon in SECTION_ICONS {
            assert!(prompt.contains(icon), "missing section {}", icon);
        }
        assert!(prompt.contains("\"\"\"\nJulgo procedente o pedido.\n\"\"\""));
    }

    #[test]
    fn test_sections_are_in_order() {
        let prompt = build_simplification_prompt("texto");
        let positions: Vec<usize> = SECTION_ICONS
            .iter()
            .map(|icon| prompt.find(icon).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
