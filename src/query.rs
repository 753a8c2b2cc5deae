use chrono::NaiveDate;
use std::fmt;

/// Comparison value of a report constraint.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintValue {
    /// Rendered as-is: numbers, booleans.
    Literal(String),
    /// Rendered single-quoted: enum names, dates, text.
    Text(String),
    LiteralList(Vec<String>),
    TextList(Vec<String>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub key: String,
    pub op: String,
    pub value: ConstraintValue,
}

impl Constraint {
    pub fn new(key: &str, op: &str, value: ConstraintValue) -> Self {
        Constraint {
            key: key.to_string(),
            op: op.to_string(),
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateConstant {
    ThisMonth,
}

impl DateConstant {
    fn as_str(&self) -> &'static str {
        match self {
            DateConstant::ThisMonth => "THIS_MONTH",
        }
    }
}

/// A report request against one entity: which attribute and metric paths to
/// select, the constraints to filter by and an optional relative date range.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportQuery {
    pub entity: String,
    pub attributes: Vec<String>,
    pub metrics: Vec<String>,
    pub constraints: Vec<Constraint>,
    pub date_constant: Option<DateConstant>,
}

const ACTIVE_CAMPAIGN_STATUSES: [&str; 2] = ["ENABLED", "PAUSED"];

impl ReportQuery {
    fn new(entity: &str, attributes: &[&str], metrics: &[&str]) -> Self {
        ReportQuery {
            entity: entity.to_string(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            constraints: vec![],
            date_constant: None,
        }
    }

    /// Direct clients (and the queried account itself at level 0) that are
    /// neither hidden nor disabled.
    pub fn customer_clients() -> Self {
        let mut query = ReportQuery::new(
            "customer_client",
            &[
                "customer_client.client_customer",
                "customer_client.level",
                "customer_client.manager",
                "customer_client.descriptive_name",
                "customer_client.currency_code",
                "customer_client.time_zone",
                "customer_client.id",
            ],
            &[],
        );
        query.constraints = vec![
            Constraint::new("customer_client.level", "<=", ConstraintValue::Literal("1".into())),
            Constraint::new("customer_client.hidden", "=", ConstraintValue::Literal("FALSE".into())),
            Constraint::new("customer_client.status", "=", ConstraintValue::Text("ENABLED".into())),
        ];
        query
    }

    /// Campaign attributes with month-to-date metrics.
    pub fn campaign_list(campaign_ids: &[String]) -> Self {
        let mut query = ReportQuery::new(
            "campaign",
            &[
                "campaign.id",
                "campaign.name",
                "campaign.resource_name",
                "campaign.bidding_strategy_type",
                "campaign.status",
                "campaign_budget.id",
                "campaign_budget.amount_micros",
                "campaign_budget.resource_name",
            ],
            &[
                "metrics.cost_micros",
                "metrics.clicks",
                "metrics.impressions",
                "metrics.all_conversions",
                "metrics.average_cpc",
            ],
        );
        query.constraints = campaign_constraints(campaign_ids);
        query.date_constant = Some(DateConstant::ThisMonth);
        query
    }

    /// Cost per campaign over the dates in `(start, end]`.
    pub fn campaign_cost(campaign_ids: &[String], start: NaiveDate, end: NaiveDate) -> Self {
        let mut query = ReportQuery::new("campaign", &["campaign.id"], &["metrics.cost_micros"]);
        let mut constraints = campaign_constraints(campaign_ids);
        constraints.insert(
            1,
            Constraint::new("segments.date", ">", ConstraintValue::Text(start.to_string())),
        );
        constraints.insert(
            2,
            Constraint::new("segments.date", "<=", ConstraintValue::Text(end.to_string())),
        );
        query.constraints = constraints;
        query
    }

    /// Renders the query in the ads query language.
    pub fn to_gaql(&self) -> String {
        let fields: Vec<&str> = self
            .attributes
            .iter()
            .chain(self.metrics.iter())
            .map(String::as_str)
            .collect();

        let mut conditions: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        if let Some(date_constant) = self.date_constant {
            conditions.push(format!("segments.date DURING {}", date_constant.as_str()));
        }

        let mut gaql = format!("SELECT {} FROM {}", fields.join(", "), self.entity);
        if !conditions.is_empty() {
            gaql.push_str(" WHERE ");
            gaql.push_str(&conditions.join(" AND "));
        }
        gaql
    }
}

fn campaign_constraints(campaign_ids: &[String]) -> Vec<Constraint> {
    let mut constraints = vec![Constraint::new(
        "campaign.status",
        "IN",
        ConstraintValue::TextList(ACTIVE_CAMPAIGN_STATUSES.iter().map(|s| s.to_string()).collect()),
    )];
    if !campaign_ids.is_empty() {
        constraints.push(Constraint::new(
            "campaign.id",
            "IN",
            ConstraintValue::LiteralList(campaign_ids.to_vec()),
        ));
    }
    constraints
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.op, self.value)
    }
}

impl fmt::Display for ConstraintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintValue::Literal(v) => write!(f, "{}", v),
            ConstraintValue::Text(v) => write!(f, "'{}'", escape(v)),
            ConstraintValue::LiteralList(values) => write!(f, "({})", values.join(", ")),
            ConstraintValue::TextList(values) => {
                let quoted: Vec<String> =
                    values.iter().map(|v| format!("'{}'", escape(v))).collect();
                write!(f, "({})", quoted.join(", "))
            }
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
