//! Turns SSO account names into profile names.

use clap::ValueEnum;
use deunicode::deunicode;

/// Letter case of generated profile names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Spelling {
    Lower,
    Upper,
}

/// Builds a profile name from an account name: case it per `spelling`, put `prefix` in front,
/// transliterate to ASCII, and use `separator` in place of hyphens, underscores and spaces,
/// never twice in a row.
///
/// For example "Conexão Produção" with prefix "new" becomes "new-conexao-producao".
pub(crate) fn normalize_name(
    name: &str,
    prefix: Option<&str>,
    spelling: Spelling,
    separator: &str,
) -> String {
    let name = match spelling {
        Spelling::Lower => name.to_lowercase(),
        Spelling::Upper => name.to_uppercase(),
    };
    let name = match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}{}{}", prefix, separator, name),
        None => name,
    };

    let mut name = deunicode(&name)
        .replace('-', separator)
        .replace('_', separator)
        .replace(' ', separator);

    if !separator.is_empty() {
        let doubled = separator.repeat(2);
        while name.contains(&doubled) {
            name = name.replace(&doubled, separator);
        }
    }
    name
}
