use crate::types::{Row, UNASSIGNED_CODE};

pub struct MacrozoneInfo {
    pub name: &'static str,
    pub province: &'static str,
}

/// Macrozone source id → display name and province code.
pub fn macrozone_info(id: &str) -> Option<MacrozoneInfo> {
    let (name, province) = match id.trim() {
        "1" => ("Aysén Noroeste", "112"),
        "2" => ("Aysén Sur", "112"),
        "3" => ("Aysén Noreste", "112"),
        "4" => ("Chiloé Centro", "102"),
        "5" => ("Palena", "104"),
        "6" => ("Chiloé Sur", "102"),
        "7" => ("Chiloé Norte", "102"),
        "8" => ("Tortel", "101"),
        "9" => ("Magallanes Sur", "124"),
        "10" => ("Magallanes Norte", "124"),
        _ => return None,
    };
    Some(MacrozoneInfo { name, province })
}

pub struct CodeEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

/// A small dimension whose rows are known ahead of time. Every list carries
/// the reserved `00` entry.
pub struct CodeList {
    pub dimension: &'static str,
    pub name: &'static str,
    pub entries: &'static [CodeEntry],
}

impl CodeList {
    /// Resolves raw CSV text to a row code by case-insensitive match on the
    /// code, the name or an alias. Anything unmatched is `00`.
    pub fn resolve(&self, raw: &str) -> &'static str {
        let raw = raw.trim();
        if raw.is_empty() {
            return UNASSIGNED_CODE;
        }
        self.entries
            .iter()
            .find(|e| {
                e.code.eq_ignore_ascii_case(raw)
                    || e.name.to_lowercase() == raw.to_lowercase()
                    || e.aliases.iter().any(|a| a.eq_ignore_ascii_case(raw))
            })
            .map(|e| e.code)
            .unwrap_or(UNASSIGNED_CODE)
    }

    pub fn rows(&self) -> Vec<Row> {
        self.entries.iter().map(|e| Row::new(e.code, e.name)).collect()
    }
}

const fn entry(code: &'static str, name: &'static str, aliases: &'static [&'static str]) -> CodeEntry {
    CodeEntry { code, name, aliases }
}

pub const DEPTHS: CodeList = CodeList {
    dimension: "fipafan2019.profundidad",
    name: "Profundidad FIPA-FAN-2019",
    entries: &[
        entry("00", "Sin Información", &[]),
        entry("01", "0 m", &["0", "0m", "superficie"]),
        entry("02", "5 m", &["5", "5m"]),
        entry("03", "10 m", &["10", "10m"]),
        entry("04", "20 m", &["20", "20m"]),
    ],
};

pub const PROGRAMS: CodeList = CodeList {
    dimension: "fipafan2019.programa",
    name: "Programa de Monitoreo FIPA-FAN-2019",
    entries: &[
        entry("00", "No Indicado", &[]),
        entry("PSMB", "Programa de Sanidad de Moluscos Bivalvos", &["sernapesca"]),
        entry("MMR", "Programa de Manejo y Monitoreo de Marea Roja", &["ifop", "marea roja"]),
        entry("FIPA", "Proyecto FIPA 2019", &["fipa2019"]),
    ],
};

pub const WIND_DIRECTIONS: CodeList = CodeList {
    dimension: "fipafan2019.direccionViento",
    name: "Dirección del Viento",
    entries: &[
        entry("00", "Sin Información", &[]),
        entry("N", "Norte", &[]),
        entry("NE", "Noreste", &[]),
        entry("E", "Este", &[]),
        entry("SE", "Sureste", &[]),
        entry("S", "Sur", &[]),
        entry("SO", "Suroeste", &["SW"]),
        entry("O", "Oeste", &["W"]),
        entry("NO", "Noroeste", &["NW"]),
        entry("C", "Calma", &["calm"]),
    ],
};

pub const RESOURCES: CodeList = CodeList {
    dimension: "fipafan2019.recurso",
    name: "Recurso FIPA-FAN-2019",
    entries: &[
        entry("00", "Sin Información", &[]),
        entry("01", "Chorito", &["mytilus chilensis"]),
        entry("02", "Cholga", &["aulacomya atra"]),
        entry("03", "Choro", &["choromytilus chorus"]),
        entry("04", "Almeja", &["venus antiqua"]),
        entry("05", "Ostra", &["ostrea chilensis"]),
        entry("06", "Loco", &["concholepas concholepas"]),
        entry("07", "Navajuela", &["tagelus dombeii"]),
    ],
};

pub const SPECIES: CodeList = CodeList {
    dimension: "fipafan2019.especie",
    name: "Especie Fitoplanctónica",
    entries: &[
        entry("00", "Sin Información", &[]),
        entry("01", "Alexandrium catenella", &[]),
        entry("02", "Dinophysis acuminata", &[]),
        entry("03", "Dinophysis acuta", &[]),
        entry("04", "Pseudo-nitzschia australis", &[]),
        entry("05", "Protoceratium reticulatum", &[]),
    ],
};

/// Code lists in provisioning order.
pub fn all() -> [&'static CodeList; 5] {
    [&DEPTHS, &PROGRAMS, &WIND_DIRECTIONS, &RESOURCES, &SPECIES]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_list_has_reserved_row() {
        for list in all() {
            assert!(
                list.entries.iter().any(|e| e.code == UNASSIGNED_CODE),
                "{} lacks 00",
                list.dimension
            );
        }
    }

    #[test]
    fn resolve_matches_code_name_and_alias() {
        assert_eq!(WIND_DIRECTIONS.resolve(" ne "), "NE");
        assert_eq!(WIND_DIRECTIONS.resolve("sw"), "SO");
        assert_eq!(RESOURCES.resolve("CHORITO"), "01");
        assert_eq!(PROGRAMS.resolve("ifop"), "MMR");
    }

    #[test]
    fn unknown_or_empty_resolves_to_reserved() {
        assert_eq!(WIND_DIRECTIONS.resolve("variable"), "00");
        assert_eq!(RESOURCES.resolve(""), "00");
    }

    #[test]
    fn macrozone_table_lookup() {
        let info = macrozone_info("4").unwrap();
        assert_eq!(info.name, "Chiloé Centro");
        assert_eq!(info.province, "102");
        assert!(macrozone_info("99").is_none());
    }
}
