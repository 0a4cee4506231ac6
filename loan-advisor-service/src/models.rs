use loan_advisor::{
    AdvisorError, BusinessRequest, FinancialAdviceRequest, Funding, PredictionInput,
    model::parse_self_employed,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct StartSessionForm {
    pub name: String,
    pub country: String,
}

/// Loan application form. Numeric fields arrive as text and are validated
/// in [`PredictForm::to_input`] so a bad field can be named in the reply.
#[derive(Debug, Deserialize)]
pub struct PredictForm {
    pub depend: String,
    pub education: String,
    pub employment: String,
    pub income: String,
    pub loan_amount: String,
    pub loan_term: String,
    pub score: String,
    pub resident: String,
    pub commercial: String,
    pub luxury: String,
    pub bank: String,
    #[serde(default)]
    pub marital_status: Option<String>,
    #[serde(default)]
    pub property_area: Option<String>,
    #[serde(default)]
    pub loan_purpose: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

fn parse_field<T: std::str::FromStr>(name: &str, raw: &str) -> loan_advisor::Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        AdvisorError::Prediction(format!("field '{}' has an invalid value '{}'", name, raw))
    })
}

fn parse_amount(name: &str, raw: &str) -> loan_advisor::Result<f64> {
    let value: f64 = parse_field(name, raw)?;
    if !value.is_finite() || value < 0.0 {
        return Err(AdvisorError::Prediction(format!(
            "field '{}' must be a non-negative number",
            name
        )));
    }
    Ok(value)
}

impl PredictForm {
    pub fn to_input(&self) -> loan_advisor::Result<PredictionInput> {
        Ok(PredictionInput {
            no_of_dependents: parse_field("depend", &self.depend)?,
            education: self.education.parse()?,
            self_employed: parse_self_employed(&self.employment)?,
            income_annum: parse_amount("income", &self.income)?,
            loan_amount: parse_amount("loan_amount", &self.loan_amount)?,
            loan_term: parse_field("loan_term", &self.loan_term)?,
            cibil_score: parse_field("score", &self.score)?,
            residential_assets_value: parse_amount("resident", &self.resident)?,
            commercial_assets_value: parse_amount("commercial", &self.commercial)?,
            luxury_assets_value: parse_amount("luxury", &self.luxury)?,
            bank_asset_value: parse_amount("bank", &self.bank)?,
        })
    }
}

/// Shared form behind the business-idea and financial-advice pages.
#[derive(Debug, Deserialize)]
pub struct AdviceForm {
    pub domain_interest: String,
    pub country_interest: String,
    pub capital_loan: String,
    pub amount: String,
    #[serde(default)]
    pub loan_pay_month: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AdviceForm {
    pub fn funding(&self) -> Result<Funding, String> {
        let amount: f64 = self
            .amount
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|a| a.is_finite() && *a >= 0.0)
            .ok_or_else(|| format!("Invalid amount '{}'.", self.amount))?;

        let repay_months = self
            .loan_pay_month
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| {
                m.parse::<u32>()
                    .map_err(|_| format!("Invalid loan_pay_month '{}'.", m))
            })
            .transpose()?;

        Funding::from_form(&self.capital_loan, amount, repay_months).ok_or_else(|| {
            "loan_pay_month must be a positive number of months for a loan.".to_string()
        })
    }

    pub fn business_request(&self, country: &str) -> Result<BusinessRequest, String> {
        Ok(BusinessRequest {
            country: country.to_string(),
            interest_country: self.country_interest.clone(),
            domain: self.domain_interest.clone(),
            funding: self.funding()?,
        })
    }

    pub fn financial_request(&self, country: &str) -> Result<FinancialAdviceRequest, String> {
        Ok(FinancialAdviceRequest {
            country: country.to_string(),
            interest_country: self.country_interest.clone(),
            domain: self.domain_interest.clone(),
            description: self.description.clone().unwrap_or_default(),
            funding: self.funding()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct QuestionForm {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: u8,
    pub approved: bool,
    pub name: String,
    pub country: String,
    pub purpose: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub response: Value,
}

#[derive(Debug, Serialize)]
pub struct AdviceResponse {
    pub response: Value,
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loan_advisor::Education;

    fn predict_form() -> PredictForm {
        PredictForm {
            depend: "2".to_string(),
            education: "Graduate".to_string(),
            employment: "No".to_string(),
            income: "9600000".to_string(),
            loan_amount: "29900000".to_string(),
            loan_term: "12".to_string(),
            score: "778".to_string(),
            resident: "2400000".to_string(),
            commercial: "17600000".to_string(),
            luxury: "22700000".to_string(),
            bank: "8000000".to_string(),
            marital_status: None,
            property_area: None,
            loan_purpose: Some("Expansion".to_string()),
            email: None,
            phone: None,
        }
    }

    #[test]
    fn test_predict_form_to_input() {
        let input = predict_form().to_input().unwrap();
        assert_eq!(input.no_of_dependents, 2);
        assert_eq!(input.education, Education::Graduate);
        assert!(!input.self_employed);
        assert_eq!(input.cibil_score, 778);
        assert_eq!(input.bank_asset_value, 8_000_000.0);
    }

    #[test]
    fn test_predict_form_names_bad_field() {
        let mut form = predict_form();
        form.score = "high".to_string();
        let err = form.to_input().unwrap_err();
        assert!(err.to_string().contains("'score'"));

        let mut form = predict_form();
        form.income = "-5".to_string();
        assert!(form.to_input().is_err());
    }

    #[test]
    fn test_advice_form_funding() {
        let mut form = AdviceForm {
            domain_interest: "tech".to_string(),
            country_interest: "Ghana".to_string(),
            capital_loan: "capital".to_string(),
            amount: "1500".to_string(),
            loan_pay_month: None,
            description: None,
        };
        assert_eq!(form.funding().unwrap(), Funding::Capital { amount: 1500.0 });

        form.capital_loan = "loan".to_string();
        assert!(form.funding().is_err());

        form.loan_pay_month = Some("24".to_string());
        assert_eq!(
            form.funding().unwrap(),
            Funding::Loan {
                amount: 1500.0,
                repay_months: 24
            }
        );

        form.loan_pay_month = Some("0".to_string());
        assert!(form.funding().is_err());

        form.amount = "lots".to_string();
        assert!(form.funding().is_err());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("aDA"), "Ada");
        assert_eq!(capitalize("émile"), "Émile");
        assert_eq!(capitalize(""), "");
    }
}
