use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::model::Gender;
use crate::domain::pricing::{self, PriceQuote, PromoRule, ServiceCatalog, ServiceId};
use crate::utils::error::{Result, StorefrontError};
use crate::utils::validation::{
    format_phone_number, is_valid_phone_number, is_valid_promo_code, is_valid_telegram_username,
    sanitize_input, sanitize_message, FORMATTED_PHONE_LEN, MAX_MESSAGE_INPUT, MAX_SHORT_INPUT,
    PHONE_PREFIX,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WizardStep {
    Personal,
    Services,
    Game,
    Checkout,
}

impl WizardStep {
    pub fn number(&self) -> u8 {
        match self {
            WizardStep::Personal => 1,
            WizardStep::Services => 2,
            WizardStep::Game => 3,
            WizardStep::Checkout => 4,
        }
    }

    fn next(&self) -> Option<Self> {
        match self {
            WizardStep::Personal => Some(WizardStep::Services),
            WizardStep::Services => Some(WizardStep::Game),
            WizardStep::Game => Some(WizardStep::Checkout),
            WizardStep::Checkout => None,
        }
    }

    fn previous(&self) -> Option<Self> {
        match self {
            WizardStep::Personal => None,
            WizardStep::Services => Some(WizardStep::Personal),
            WizardStep::Game => Some(WizardStep::Services),
            WizardStep::Checkout => Some(WizardStep::Game),
        }
    }
}

/// Transient client-side state; discarded on submission or abandonment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub phone: String,
    pub telegram: String,
    pub services: BTreeSet<ServiceId>,
    pub game: String,
    pub message: String,
    pub promo_code: String,
    pub no_promo: bool,
    pub payment_confirmed: bool,
}

impl Default for OrderDraft {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            gender: Gender::Male,
            phone: PHONE_PREFIX.to_string(),
            telegram: "@".to_string(),
            services: BTreeSet::new(),
            game: String::new(),
            message: String::new(),
            promo_code: String::new(),
            no_promo: false,
            payment_confirmed: false,
        }
    }
}

impl OrderDraft {
    /// 僅在未關閉促銷且格式合理時保存到訂單上
    pub fn effective_promo_code(&self) -> Option<String> {
        if self.no_promo || !is_valid_promo_code(&self.promo_code) {
            None
        } else {
            Some(self.promo_code.clone())
        }
    }

    pub fn personal_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.first_name.trim().chars().count() < 2 {
            errors.push("First name must be at least 2 characters".to_string());
        }
        if self.phone.len() != FORMATTED_PHONE_LEN || !is_valid_phone_number(&self.phone) {
            errors.push("Phone number must be in format: +998 XX XXX XX XX".to_string());
        }
        if !is_valid_telegram_username(&self.telegram) {
            errors.push("Telegram username must start with @ and be 5-33 characters".to_string());
        }
        errors
    }

    pub fn services_errors(&self, catalog: &ServiceCatalog) -> Vec<String> {
        let mut errors = Vec::new();
        if self.services.is_empty() {
            errors.push("Please select at least one design type".to_string());
        }
        for id in &self.services {
            if !catalog.contains(id) {
                errors.push(format!("Unknown service: {}", id));
            }
        }
        errors
    }

    pub fn game_errors(&self, games: Option<&[String]>) -> Vec<String> {
        let game = self.game.trim();
        if game.is_empty() {
            return vec!["Please pick a game theme".to_string()];
        }
        match games {
            Some(list) if !list.iter().any(|g| g == game) => {
                vec![format!("Unknown game: {}", game)]
            }
            _ => Vec::new(),
        }
    }

    /// Full validation run at submission time.
    pub fn validate(&self, catalog: &ServiceCatalog, games: Option<&[String]>) -> Result<()> {
        let mut errors = self.personal_errors();
        errors.extend(self.services_errors(catalog));
        errors.extend(self.game_errors(games));
        if !self.payment_confirmed {
            errors.push("Payment must be confirmed before submission".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StorefrontError::validation(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderWizard {
    step: WizardStep,
    draft: OrderDraft,
    catalog: ServiceCatalog,
    promo: PromoRule,
    games: Option<Vec<String>>,
}

impl OrderWizard {
    pub fn new(catalog: ServiceCatalog, promo: PromoRule, games: Option<Vec<String>>) -> Self {
        Self {
            step: WizardStep::Personal,
            draft: OrderDraft::default(),
            catalog,
            promo,
            games,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn into_draft(self) -> OrderDraft {
        self.draft
    }

    pub fn set_first_name(&mut self, value: &str) {
        self.draft.first_name = sanitize_input(value, MAX_SHORT_INPUT);
    }

    pub fn set_last_name(&mut self, value: &str) {
        self.draft.last_name = sanitize_input(value, MAX_SHORT_INPUT);
    }

    pub fn set_gender(&mut self, gender: Gender) {
        self.draft.gender = gender;
    }

    pub fn set_phone(&mut self, value: &str) {
        self.draft.phone = format_phone_number(value);
    }

    pub fn set_telegram(&mut self, value: &str) {
        let value = sanitize_input(value, MAX_SHORT_INPUT);
        self.draft.telegram = if value.starts_with('@') {
            value
        } else {
            format!("@{}", value)
        };
    }

    /// Unknown services are rejected; returns whether the service is now selected.
    pub fn toggle_service(&mut self, id: &str) -> Result<bool> {
        let canonical = self
            .catalog
            .canonical_id(id)
            .ok_or_else(|| StorefrontError::validation(format!("Unknown service: {}", id)))?
            .to_string();

        if self.draft.services.remove(&canonical) {
            Ok(false)
        } else {
            self.draft.services.insert(canonical);
            Ok(true)
        }
    }

    pub fn set_game(&mut self, value: &str) {
        self.draft.game = sanitize_input(value, MAX_SHORT_INPUT);
    }

    pub fn set_message(&mut self, value: &str) {
        self.draft.message = sanitize_message(value, MAX_MESSAGE_INPUT);
    }

    pub fn set_promo_code(&mut self, value: &str) {
        self.draft.promo_code = value.to_string();
    }

    pub fn set_no_promo(&mut self, disabled: bool) {
        self.draft.no_promo = disabled;
    }

    pub fn confirm_payment(&mut self, confirmed: bool) {
        self.draft.payment_confirmed = confirmed;
    }

    pub fn current_step_errors(&self) -> Vec<String> {
        match self.step {
            WizardStep::Personal => self.draft.personal_errors(),
            WizardStep::Services => self.draft.services_errors(&self.catalog),
            WizardStep::Game => self.draft.game_errors(self.games.as_deref()),
            WizardStep::Checkout => {
                if self.draft.payment_confirmed {
                    Vec::new()
                } else {
                    vec!["Payment must be confirmed before submission".to_string()]
                }
            }
        }
    }

    pub fn can_advance(&self) -> bool {
        self.current_step_errors().is_empty()
    }

    pub fn next(&mut self) -> Result<WizardStep> {
        let errors = self.current_step_errors();
        if !errors.is_empty() {
            return Err(StorefrontError::validation(errors.join("; ")));
        }
        let next = self.step.next().ok_or_else(|| {
            StorefrontError::validation("Already at checkout; submit the order instead")
        })?;
        self.step = next;
        Ok(next)
    }

    pub fn back(&mut self) -> WizardStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Live price; recomputed on every call.
    pub fn quote(&self) -> PriceQuote {
        pricing::quote(
            &self.draft.services,
            &self.catalog,
            &self.draft.promo_code,
            self.draft.no_promo,
            &self.promo,
        )
    }

    pub fn promo_applied(&self) -> bool {
        pricing::promo_applies(&self.draft.promo_code, self.draft.no_promo, &self.promo)
    }

    /// Ready for submission: on the checkout step and fully valid.
    pub fn finish(&self) -> Result<OrderDraft> {
        if self.step != WizardStep::Checkout {
            return Err(StorefrontError::validation(format!(
                "Wizard is on step {}, not checkout",
                self.step.number()
            )));
        }
        self.draft.validate(&self.catalog, self.games.as_deref())?;
        Ok(self.draft.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wizard() -> OrderWizard {
        OrderWizard::new(ServiceCatalog::default(), PromoRule::default(), None)
    }

    fn fill_personal(w: &mut OrderWizard) {
        w.set_first_name("Ali");
        w.set_phone("901234567");
        w.set_telegram("alivali");
    }

    #[test]
    fn test_cannot_skip_incomplete_personal_step() {
        let mut w = wizard();
        w.set_first_name("A");
        assert!(w.next().is_err());
        assert_eq!(w.step(), WizardStep::Personal);

        fill_personal(&mut w);
        assert_eq!(w.draft().phone, "+998 90 123 45 67");
        assert_eq!(w.draft().telegram, "@alivali");
        assert_eq!(w.next().unwrap(), WizardStep::Services);
    }

    #[test]
    fn test_toggle_has_set_semantics_and_rejects_unknown() {
        let mut w = wizard();
        assert!(w.toggle_service("banner").unwrap());
        assert!(w.toggle_service("Avatar").unwrap());
        assert!(!w.toggle_service("Banner").unwrap());
        assert_eq!(w.draft().services.len(), 1);
        assert!(w.toggle_service("Logo").is_err());
    }

    #[test]
    fn test_live_quote_follows_promo_edits() {
        let mut w = wizard();
        w.toggle_service("Banner").unwrap();
        w.toggle_service("Avatar").unwrap();
        assert_eq!(w.quote().total, 75_000);

        w.set_promo_code("Artishok_uz");
        assert_eq!(w.quote().total, 56_250);
        assert!(w.promo_applied());

        w.set_no_promo(true);
        assert_eq!(w.quote().total, 75_000);
        assert_eq!(w.draft().effective_promo_code(), None);
    }

    #[test]
    fn test_walk_to_checkout_and_finish() {
        let mut w = wizard();
        fill_personal(&mut w);
        w.next().unwrap();
        assert!(w.next().is_err());
        w.toggle_service("Preview").unwrap();
        w.next().unwrap();
        w.set_game("Minecraft");
        assert_eq!(w.next().unwrap(), WizardStep::Checkout);
        assert!(w.finish().is_err());

        w.confirm_payment(true);
        let draft = w.finish().unwrap();
        assert_eq!(draft.game, "Minecraft");
        assert_eq!(w.back(), WizardStep::Game);
    }

    #[test]
    fn test_back_stops_at_first_step() {
        let mut w = wizard();
        assert_eq!(w.back(), WizardStep::Personal);
    }

    #[test]
    fn test_configured_game_list_is_enforced() {
        let mut w = OrderWizard::new(
            ServiceCatalog::default(),
            PromoRule::default(),
            Some(vec!["Minecraft".to_string()]),
        );
        fill_personal(&mut w);
        w.next().unwrap();
        w.toggle_service("Banner").unwrap();
        assert_eq!(w.next().unwrap(), WizardStep::Game);

        w.set_game("Tetris");
        assert!(!w.can_advance());
        assert!(w.next().is_err());
        assert_eq!(w.step(), WizardStep::Game);

        w.set_game("Minecraft");
        assert_eq!(w.next().unwrap(), WizardStep::Checkout);
        w.confirm_payment(true);
        assert!(w.finish().is_ok());
    }

    #[test]
    fn test_finish_rechecks_the_game_list() {
        let mut w = OrderWizard::new(
            ServiceCatalog::default(),
            PromoRule::default(),
            Some(vec!["Minecraft".to_string()]),
        );
        fill_personal(&mut w);
        w.next().unwrap();
        w.toggle_service("Banner").unwrap();
        w.next().unwrap();
        w.set_game("Minecraft");
        w.next().unwrap();
        w.confirm_payment(true);

        // 到結帳後才改遊戲名稱
        w.set_game("Tetris");
        assert!(w.finish().is_err());
    }
}
