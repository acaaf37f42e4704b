// src/services/horoscope.rs
use crate::errors::OutfitError;
use crate::models::HoroscopeRequest;
use crate::services::providers::TextModel;
use crate::services::retry::{RetryPolicy, retry_operation};
use chrono::{Duration, NaiveDate, Utc};
use log::info;
use std::sync::Arc;

const MAX_NAME_CHARS: usize = 20;
const MAX_DAYS_AHEAD: i64 = 30;

pub struct HoroscopeService {
    model: Arc<dyn TextModel>,
    retry: RetryPolicy,
}

impl HoroscopeService {
    pub fn new(model: Arc<dyn TextModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub async fn predict(&self, request: &HoroscopeRequest) -> Result<String, OutfitError> {
        let date = validate(request, Utc::now().date_naive())?;
        let prompt = build_prompt(request, date);

        info!("Generating horoscope for {} on {}", request.zodiac_sign, date);
        let model = &self.model;
        let prompt = prompt.as_str();
        let text = retry_operation(
            "horoscope",
            &self.retry,
            move || model.generate(prompt),
            OutfitError::is_retryable,
        )
        .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(OutfitError::ExternalService(
                "text model returned an empty prediction".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

fn validate(request: &HoroscopeRequest, today: NaiveDate) -> Result<NaiveDate, OutfitError> {
    let required = [
        &request.zodiac_sign,
        &request.name,
        &request.date,
        &request.weather,
        &request.gender,
        &request.blood_type,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(OutfitError::Validation(
            "all fields are required: zodiac_sign, name, date, weather, gender, blood_type"
                .to_string(),
        ));
    }

    let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d")
        .map_err(|_| OutfitError::Validation("date must be formatted as YYYY-MM-DD".to_string()))?;
    if date < today {
        return Err(OutfitError::Validation("the date cannot be in the past".to_string()));
    }
    if date > today + Duration::days(MAX_DAYS_AHEAD) {
        return Err(OutfitError::Validation(format!(
            "predictions are only available for the next {} days",
            MAX_DAYS_AHEAD
        )));
    }

    if request.name.trim().chars().count() > MAX_NAME_CHARS {
        return Err(OutfitError::Validation(format!(
            "name must be between 1 and {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(date)
}

fn build_prompt(request: &HoroscopeRequest, date: NaiveDate) -> String {
    format!(
        "As a professional astrologer, write a horoscope for {date}.\n\n\
User profile:\n\
- Zodiac sign: {sign}\n\
- Gender: {gender}\n\
- Blood type: {blood}\n\
- Name: {name}\n\
- Weather that day: {weather}\n\n\
Cover: overall fortune (including how the weather affects mood), love, career or study, \
finances, relationships, a lucky color suited to the weather, a lucky number, and one \
personal piece of advice. Keep it short, warm and personal.",
        date = date,
        sign = request.zodiac_sign.trim(),
        gender = request.gender.trim(),
        blood = request.blood_type.trim(),
        name = request.name.trim(),
        weather = request.weather.trim(),
    )
}
