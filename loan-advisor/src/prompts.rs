//! Prompt templates. Every prompt embeds the exact JSON shape the model is
//! asked to reply with, so [`crate::extract::extract_json`] can read it back.

use serde::{Deserialize, Serialize};

const LOAN_RESOURCE_FORMAT: &str = r#"
    [
        {
            "myCountry": {"organizationName": "", "link": ""},
            "otherCountry": {"organizationName": "", "link": "", "Country": ""}
        }
    ]"#;

const BUSINESS_IDEA_FORMAT: &str = r#"
    [
        {
            "Business_Idea": "",
            "sector": "",
            "link": ""
        },
        {
            "Business_Idea": "",
            "sector": "",
            "link": ""
        }
    ]
    "#;

const FINANCIAL_ADVICE_FORMAT: &str = r#"
    {
        "financial_breakdown": "",
        "link": ""
    }
    "#;

/// How the applicant's business is funded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Funding {
    Capital { amount: f64 },
    Loan { amount: f64, repay_months: u32 },
}

impl Funding {
    /// Maps the form's `capital_loan` field. Anything other than `"capital"`
    /// is treated as a loan, which needs a repayment period of at least one
    /// month; `None` when it is missing or zero.
    pub fn from_form(mode: &str, amount: f64, repay_months: Option<u32>) -> Option<Self> {
        if mode.trim().eq_ignore_ascii_case("capital") {
            return Some(Funding::Capital { amount });
        }
        repay_months
            .filter(|months| *months > 0)
            .map(|repay_months| Funding::Loan {
                amount,
                repay_months,
            })
    }

    pub fn amount(&self) -> f64 {
        match self {
            Funding::Capital { amount } | Funding::Loan { amount, .. } => *amount,
        }
    }

    fn describe(&self) -> String {
        match self {
            Funding::Capital { amount } => format!("I have a capital of {} US Dollars", amount),
            Funding::Loan {
                amount,
                repay_months,
            } => format!(
                "I got a loan of {} US Dollars and I am meant to pay back in {} months time",
                amount, repay_months
            ),
        }
    }
}

/// Inputs shared by the business-idea prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRequest {
    pub country: String,
    pub interest_country: String,
    pub domain: String,
    pub funding: Funding,
}

/// Inputs for the financial-advice prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialAdviceRequest {
    pub country: String,
    pub interest_country: String,
    pub domain: String,
    pub description: String,
    pub funding: Funding,
}

pub fn build_loan_resource_prompt(country: &str) -> String {
    format!(
        "Hi, my country is {}. Kindly give me a list of places I can get a good loan for my small business. Reply only in this JSON format without explanation: {} Ensure links are valid and use organization names.",
        country, LOAN_RESOURCE_FORMAT
    )
}

pub fn build_business_idea_prompt(
    country: &str,
    interest_country: &str,
    funding: &Funding,
    domain: &str,
) -> String {
    format!(
        "Hi, I'm from {}. Kindly help curate few nice business ideas, the domain sector of the business and like to learn more on the business, considering that {}. My domain of business interest is {} and the country where I want to have my business is {}. Give the answer strictly in this format: {} Thanks.",
        country,
        funding.describe(),
        domain,
        interest_country,
        BUSINESS_IDEA_FORMAT
    )
}

pub fn build_financial_advice_prompt(
    country: &str,
    interest_country: &str,
    description: &str,
    funding: &Funding,
    domain: &str,
) -> String {
    format!(
        "Hi, I'm from {}. Kindly help curate a comprehensive financial breakdown with link to read more on it, for how I would manage my business considering that {}. My domain of business interest is {}, the description is: {}, and the country where I want to have my business is {}. Make your answer strictly in this format: {}.",
        country,
        funding.describe(),
        domain,
        description,
        interest_country,
        FINANCIAL_ADVICE_FORMAT
    )
}

impl BusinessRequest {
    pub fn prompt(&self) -> String {
        build_business_idea_prompt(
            &self.country,
            &self.interest_country,
            &self.funding,
            &self.domain,
        )
    }
}

impl FinancialAdviceRequest {
    pub fn prompt(&self) -> String {
        build_financial_advice_prompt(
            &self.country,
            &self.interest_country,
            &self.description,
            &self.funding,
            &self.domain,
        )
    }
}
