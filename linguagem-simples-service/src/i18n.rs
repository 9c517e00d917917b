use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LOCALE: &str = "pt-BR";

/// Internationalization service using Fluent (thread-safe)
pub struct I18n {
    bundles: RwLock<HashMap<String, FluentBundle<FluentResource>>>,
    default_locale: String,
}

impl I18n {
    /// Create a new i18n service with the embedded Portuguese and English translations
    pub fn new() -> Self {
        let i18n = Self {
            bundles: RwLock::new(HashMap::new()),
            default_locale: DEFAULT_LOCALE.to_string(),
        };

        if let Err(e) = i18n.add_locale("pt-BR", PT_BR_TRANSLATIONS) {
            warn!(error = %e, "Failed to load embedded Portuguese translations");
        }
        if let Err(e) = i18n.add_locale("en", EN_TRANSLATIONS) {
            warn!(error = %e, "Failed to load embedded English translations");
        }

        i18n
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Add a locale with translations
    pub fn add_locale(&self, locale: &str, content: &str) -> Result<(), String> {
        let lang_id: LanguageIdentifier = locale
            .parse()
            .map_err(|e| format!("Invalid locale '{}': {}", locale, e))?;

        let resource = FluentResource::try_new(content.to_string())
            .map_err(|(_, errors)| format!("Failed to parse Fluent resource: {:?}", errors))?;

        let mut bundle = FluentBundle::new_concurrent(vec![lang_id]);
        // Messages end up in JSON bodies and PDFs, not in bidi-aware UI text
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| format!("Failed to add resource to bundle: {:?}", errors))?;

        let mut bundles = self.bundles.write().unwrap();
        bundles.insert(locale.to_string(), bundle);

        debug!(locale = %locale, "Loaded translations");

        Ok(())
    }

    /// Get a translated message
    pub fn get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        // Try requested locale, fall back to default, fall back to key
        self.try_get(locale, key, args)
            .or_else(|| self.try_get(&self.default_locale, key, args))
            .unwrap_or_else(|| key.to_string())
    }

    /// Try to get a translation from a specific locale
    fn try_get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundles = self.bundles.read().unwrap();
        let bundle = bundles.get(locale)?;
        let message = bundle.get_message(key)?;
        let pattern = message.value()?;

        let mut errors = vec![];
        let result = bundle.format_pattern(pattern, args, &mut errors);

        if !errors.is_empty() {
            warn!(key = %key, errors = ?errors, "Fluent formatting errors");
        }

        Some(result.to_string())
    }

    /// Get a translated message with arguments
    pub fn format(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (k, v) in args {
            fluent_args.set(*k, *v);
        }
        self.get(locale, key, Some(&fluent_args))
    }

    /// Pick a loaded locale from an `Accept-Language` header value.
    ///
    /// Tags are taken in order of appearance; quality weights are ignored.
    pub fn negotiate(&self, accept_language: Option<&str>) -> String {
        let Some(header) = accept_language else {
            return self.default_locale.clone();
        };

        let bundles = self.bundles.read().unwrap();
        for tag in header.split(',') {
            let tag = tag.split(';').next().unwrap_or("").trim();
            if tag.is_empty() || tag == "*" {
                continue;
            }
            if bundles.contains_key(tag) {
                return tag.to_string();
            }
            let language = tag.split('-').next().unwrap_or(tag);
            if let Some(locale) = bundles
                .keys()
                .find(|loaded| loaded.split('-').next() == Some(language))
            {
                return locale.clone();
            }
        }

        self.default_locale.clone()
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new()
    }
}

const PT_BR_TRANSLATIONS: &str = r#"
# Linguagem Simples - Português (Brasil)

# Errors
error-invalid-request = Requisição inválida: { $details }
error-text-too-short = Texto muito curto. Mínimo: { $min } caracteres
error-text-too-long = Texto muito longo. Máximo: { $max } caracteres
error-rate-limit = Muitas requisições. Tente novamente em { $seconds } segundos.
error-result-not-found = Resultado não encontrado ou expirado. Processe o documento novamente.
error-file-too-large = Arquivo muito grande. Máximo: { $max_mb }MB
error-not-pdf = Por favor, envie apenas arquivos PDF
error-invalid-pdf = Não foi possível ler o PDF. Verifique se o arquivo não está corrompido ou protegido por senha.
error-no-text = Não foi possível extrair texto do documento
error-llm-not-configured = Nenhum modelo de IA está configurado no servidor
error-llm-unavailable = O serviço de IA está indisponível no momento. Tente novamente mais tarde.
error-internal = Ocorreu um erro interno

# Feedback
feedback-thanks = Obrigado pela sua avaliação!

# PDF
pdf-title = Documento Simplificado
pdf-generated-at = Gerado em { $date }
pdf-page-footer = Página { $page } de { $total }
pdf-disclaimer = Este texto é uma simplificação e não substitui a orientação de um advogado ou defensor público.

# Health
health-status-healthy = Serviço operando normalmente
health-status-degraded = Serviço com funcionamento parcial: { $reason }
health-no-providers = nenhum modelo de IA configurado
"#;

const EN_TRANSLATIONS: &str = r#"
# Linguagem Simples - English

# Errors
error-invalid-request = Invalid request: { $details }
error-text-too-short = Text too short. Minimum: { $min } characters
error-text-too-long = Text too long. Maximum: { $max } characters
error-rate-limit = Too many requests. Please try again in { $seconds } seconds.
error-result-not-found = Result not found or expired. Please process the document again.
error-file-too-large = File too large. Maximum: { $max_mb }MB
error-not-pdf = Please upload PDF files only
error-invalid-pdf = The PDF could not be read. Check that it is not corrupted or password protected.
error-no-text = No text could be extracted from the document
error-llm-not-configured = No AI model is configured on the server
error-llm-unavailable = The AI service is currently unavailable. Please try again later.
error-internal = An internal error occurred

# Feedback
feedback-thanks = Thank you for your feedback!

# PDF
pdf-title = Simplified Document
pdf-generated-at = Generated on { $date }
pdf-page-footer = Page { $page } of { $total }
pdf-disclaimer = This text is a simplification and does not replace advice from a lawyer or public defender.

# Health
health-status-healthy = Service is healthy
health-status-degraded = Service is degraded: { $reason }
health-no-providers = no AI model configured
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_message() {
        let i18n = I18n::new();

        let msg = i18n.get("pt-BR", "error-not-pdf", None);
        assert_eq!(msg, "Por favor, envie apenas arquivos PDF");
    }

    #[test]
    fn test_format_message() {
        let i18n = I18n::new();

        let msg = i18n.format("en", "error-text-too-short", &[("min", "20")]);
        assert_eq!(msg, "Text too short. Minimum: 20 characters");
    }

    #[test]
    fn test_fallback_to_key() {
        let i18n = I18n::new();

        let msg = i18n.get("pt-BR", "nonexistent-key", None);
        assert_eq!(msg, "nonexistent-key");
    }

    #[test]
    fn test_fallback_to_default_locale() {
        let i18n = I18n::new();

        // French is not loaded, Portuguese is the default
        let msg = i18n.get("fr", "feedback-thanks", None);
        assert_eq!(msg, "Obrigado pela sua avaliação!");
    }

    #[test]
    fn test_negotiate_locale() {
        let i18n = I18n::new();

        assert_eq!(i18n.negotiate(None), "pt-BR");
        assert_eq!(i18n.negotiate(Some("en-US,en;q=0.9")), "en");
        assert_eq!(i18n.negotiate(Some("pt-PT,pt;q=0.8")), "pt-BR");
        assert_eq!(i18n.negotiate(Some("de-DE")), "pt-BR");
        assert_eq!(i18n.negotiate(Some("*")), "pt-BR");
    }
}
