//! Async driver around the checkout wizard.
//!
//! Issues tickets from the wizard, awaits the lookup and quote adapters and
//! hands results back; the wizard decides what is stale. Submission persists
//! through the order saga and clears the cart only once the order exists.

use pratas_common::address::PostalCode;
use pratas_common::cart::Cart;
use pratas_common::checkout::{CheckoutWizard, WizardError};
use pratas_common::order::{Customer, Order};
use pratas_common::package::{aggregate, declared_items};
use thiserror::Error;
use tracing::{debug, warn};

use crate::adapters::{AddressLookup, OrderStore, QuoteProvider};
use crate::orders::{place_order, PlaceOrderError};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] WizardError),

    #[error(transparent)]
    Failed(#[from] PlaceOrderError),
}

impl SubmitError {
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Invalid(WizardError::MissingFields(_)) => {
                "Preencha todos os campos obrigatórios.".to_string()
            }
            SubmitError::Invalid(WizardError::EmptyCart) => "Seu carrinho está vazio.".to_string(),
            SubmitError::Invalid(e) => e.to_string(),
            SubmitError::Failed(e) => e.user_message(),
        }
    }
}

pub struct CheckoutSession<'a, L, Q, S> {
    wizard: CheckoutWizard,
    origin: PostalCode,
    lookup: &'a L,
    quotes: &'a Q,
    store: &'a S,
}

impl<'a, L, Q, S> CheckoutSession<'a, L, Q, S>
where
    L: AddressLookup,
    Q: QuoteProvider,
    S: OrderStore,
{
    pub fn new(
        reference: impl Into<String>,
        origin: PostalCode,
        lookup: &'a L,
        quotes: &'a Q,
        store: &'a S,
    ) -> Self {
        Self {
            wizard: CheckoutWizard::new(reference),
            origin,
            lookup,
            quotes,
            store,
        }
    }

    pub fn wizard(&self) -> &CheckoutWizard {
        &self.wizard
    }

    /// Direct access for field edits, carrier choice, payment and navigation.
    pub fn wizard_mut(&mut self) -> &mut CheckoutWizard {
        &mut self.wizard
    }

    /// Open checkout. A signed-in customer with a complete saved postal code
    /// gets a quote immediately.
    pub async fn start(&mut self, customer: Option<&Customer>, cart: &Cart) {
        if let Some(customer) = customer {
            if self.wizard.prefill(customer) {
                self.refresh_shipping(cart).await;
            }
        }
    }

    /// Postal code edit. At full length, looks the address up and re-quotes.
    pub async fn set_postal_code(&mut self, raw: &str, cart: &Cart) {
        if self.wizard.set_postal_code(raw).is_some() {
            self.lookup_address().await;
            self.refresh_shipping(cart).await;
        }
    }

    pub async fn lookup_address(&mut self) {
        let Some(ticket) = self.wizard.begin_lookup() else {
            return;
        };
        let found = match self.lookup.lookup(&ticket.postal_code).await {
            Ok(found) => found,
            Err(e) => {
                warn!(postal_code = %ticket.postal_code, error = %e, "address lookup failed");
                None
            }
        };
        if !self.wizard.apply_lookup(&ticket, found) {
            debug!(postal_code = %ticket.postal_code, "discarding stale address lookup");
        }
    }

    /// Quote the current cart to the current postal code.
    pub async fn refresh_shipping(&mut self, cart: &Cart) {
        if cart.is_empty() {
            return;
        }
        let Some(ticket) = self.wizard.begin_quote() else {
            return;
        };
        let package = aggregate(cart.lines());
        let items = declared_items(cart.lines());
        let result = self
            .quotes
            .quote(&self.origin, &ticket.postal_code, &package, &items)
            .await;
        if !self.wizard.apply_quote(&ticket, result) {
            debug!(postal_code = %ticket.postal_code, "discarding stale shipping quote");
        }
    }

    /// Place the order. The cart is cleared only on success; on failure the
    /// wizard and cart are untouched so the user can retry with the same
    /// checkout reference.
    pub async fn submit(&mut self, cart: &mut Cart) -> Result<Order, SubmitError> {
        let request = self.wizard.submission(cart)?;
        let order = place_order(self.store, &request).await?;
        cart.clear();
        Ok(order)
    }
}
