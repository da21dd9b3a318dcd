//! Immutable pipeline configuration.
//!
//! Built once from [`Settings`] and passed by reference into the loader,
//! normalizer, aggregator and views. Nothing here is global state.

use std::collections::BTreeMap;

use crate::classifier::{CategoryRule, MatchType, TypeRule};
use crate::models::{ExpenseType, Field};
use crate::settings::Settings;

pub const MONTH_NAMES: [&str; 12] = [
    "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho",
    "Julho", "Agosto", "Setembro", "Outubro", "Novembro", "Dezembro",
];

pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun",
    "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

/// Accepted header spellings for each logical column. The first header in a
/// file matching any alias wins.
#[derive(Debug, Clone)]
pub struct ColumnNames {
    pub account: Vec<String>,
    pub value: Vec<String>,
    pub type_tag: Vec<String>,
    pub category: Vec<String>,
    pub date: Vec<String>,
    pub month_year: Vec<String>,
    pub user: Vec<String>,
    pub vehicle: Vec<String>,
    pub odometer: Vec<String>,
    pub liters: Vec<String>,
    pub description: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            account: names(&["Conta"]),
            value: names(&["Valor"]),
            type_tag: names(&["GASTOS", "Tipo"]),
            category: names(&["Categoria"]),
            date: names(&["Data"]),
            month_year: names(&["Mês Ano", "Mes Ano"]),
            user: names(&["Usuário", "Usuario"]),
            vehicle: names(&["Veículos", "Veículo", "Veiculo"]),
            odometer: names(&["KM"]),
            liters: names(&["Litros"]),
            description: names(&["Descrição", "Descricao"]),
        }
    }
}

impl ColumnNames {
    pub fn aliases(&self, field: Field) -> &[String] {
        match field {
            Field::Account => &self.account,
            Field::Value => &self.value,
            Field::TypeTag => &self.type_tag,
            Field::Category => &self.category,
            Field::Date => &self.date,
            Field::MonthYear => &self.month_year,
            Field::User => &self.user,
            Field::Vehicle => &self.vehicle,
            Field::Odometer => &self.odometer,
            Field::Liters => &self.liters,
            Field::Description => &self.description,
        }
    }

    /// Header written when records are emitted back to a table.
    pub fn canonical(&self, field: Field) -> &str {
        self.aliases(field).first().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub currency_symbol: String,
    pub revenue_marker: String,
    pub product_line_label: String,
    pub unclassified_type_label: String,
    pub unclassified_category: String,
    pub other_label: String,
    pub top_n: usize,
    pub infer_types_from_category: bool,
    pub columns: ColumnNames,
    pub type_rules: Vec<TypeRule>,
    pub category_rules: Vec<CategoryRule>,
    pub palette: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl Config {
    pub fn from_settings(settings: &Settings) -> Self {
        let type_rules = vec![
            TypeRule::new("Fixo", MatchType::Contains, ExpenseType::Fixed),
            TypeRule::new("Investimento", MatchType::Contains, ExpenseType::Investment),
            TypeRule::new("Não Operacional", MatchType::Contains, ExpenseType::NonOperational),
            TypeRule::new("Variável", MatchType::Contains, ExpenseType::Variable),
            TypeRule::new(
                &settings.product_line_label,
                MatchType::Contains,
                ExpenseType::ProductLine,
            ),
        ];

        let category_rules = [
            ("Aluguel", ExpenseType::Fixed),
            ("Energia", ExpenseType::Fixed),
            ("Água", ExpenseType::Fixed),
            ("Internet", ExpenseType::Fixed),
            ("Telefone", ExpenseType::Fixed),
            ("Salários", ExpenseType::Fixed),
            ("Seguros", ExpenseType::Fixed),
            ("Impostos", ExpenseType::Fixed),
            ("Material de Escritório", ExpenseType::Variable),
            ("Transporte", ExpenseType::Variable),
            ("Alimentação", ExpenseType::Variable),
            ("Marketing", ExpenseType::Variable),
            ("Manutenção", ExpenseType::Variable),
            ("Combustível", ExpenseType::Variable),
            ("Viagens", ExpenseType::NonOperational),
            ("Investimentos", ExpenseType::NonOperational),
            ("Financiamentos", ExpenseType::NonOperational),
            ("Despesas Extraordinárias", ExpenseType::NonOperational),
        ]
        .into_iter()
        .map(|(pattern, kind)| CategoryRule::new(pattern, kind))
        .collect();

        let palette = [
            ("primary", "#3498db"),
            ("secondary", "#2ecc71"),
            ("danger", "#e74c3c"),
            ("warning", "#f39c12"),
            ("info", "#1abc9c"),
            ("dark", "#34495e"),
            ("light", "#ecf0f1"),
            ("fixed", "#9b59b6"),
            ("variable", "#3498db"),
            ("non_operational", "#e74c3c"),
            ("investment", "#f39c12"),
            ("product_line", "#1abc9c"),
            ("balance", "#2ecc71"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            currency_symbol: settings.currency_symbol.clone(),
            revenue_marker: settings.revenue_marker.clone(),
            product_line_label: settings.product_line_label.clone(),
            unclassified_type_label: "Não Classificado".to_string(),
            unclassified_category: "Não Classificada".to_string(),
            other_label: "Outros".to_string(),
            top_n: 5,
            infer_types_from_category: settings.infer_types_from_category,
            columns: ColumnNames::default(),
            type_rules,
            category_rules,
            palette,
        }
    }

    pub fn type_label(&self, kind: ExpenseType) -> &str {
        match kind {
            ExpenseType::Fixed => "Fixo",
            ExpenseType::Investment => "Investimento",
            ExpenseType::NonOperational => "Saída Não Operacional",
            ExpenseType::Variable => "Variável",
            ExpenseType::ProductLine => &self.product_line_label,
            ExpenseType::Unclassified => &self.unclassified_type_label,
        }
    }

    pub fn color(&self, key: &str) -> Option<String> {
        self.palette.get(key).cloned()
    }

    /// Full month name for 1..=12.
    pub fn month_name(&self, month: u32) -> Option<&'static str> {
        MONTH_NAMES.get((month as usize).checked_sub(1)?).copied()
    }

    pub fn month_abbreviation(&self, month: u32) -> Option<&'static str> {
        MONTH_ABBREVIATIONS.get((month as usize).checked_sub(1)?).copied()
    }

    /// Month number from a Portuguese or English month name, any case.
    pub fn month_from_name(&self, name: &str) -> Option<u32> {
        const ENGLISH: [&str; 12] = [
            "january", "february", "march", "april", "may", "june",
            "july", "august", "september", "october", "november", "december",
        ];
        let lower = name.trim().to_lowercase();
        MONTH_NAMES
            .iter()
            .position(|m| m.to_lowercase() == lower)
            .or_else(|| ENGLISH.iter().position(|m| *m == lower))
            .or_else(|| MONTH_ABBREVIATIONS.iter().position(|m| m.to_lowercase() == lower))
            .map(|i| i as u32 + 1)
    }
}
