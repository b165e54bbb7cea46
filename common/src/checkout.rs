//! Checkout wizard state: address → payment → review → submit.
//!
//! This is the synchronous half of the checkout. It owns every field the user
//! typed plus the shipping selection, and decides which asynchronous results
//! are still relevant. The async driver in the storefront crate issues
//! tickets from here, awaits the adapters and hands the results back.
//!
//! Staleness is decided by generation counters carried inside the tickets, so
//! responses arriving out of order are discarded deterministically.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::{AddressField, PartialAddress, PostalCode, ShippingAddress};
use crate::cart::Cart;
use crate::currency::{format_installment, installment_amount, MAX_INSTALLMENTS};
use crate::order::{Customer, NewCustomer, NewOrderItem, PaymentMethod};
use crate::quote::{QuoteError, QuoteOutcome, ShippingQuote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    CollectingAddress,
    ChoosingPayment,
    ReviewingOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Name,
    Email,
    Phone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl ContactDetails {
    fn missing_fields(&self) -> Vec<&'static str> {
        [("name", &self.name), ("email", &self.email), ("phone", &self.phone)]
            .into_iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChoice {
    pub method: PaymentMethod,
    /// Always 1 for pix.
    pub installments: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    /// Required fields still blank, blocking the step transition.
    MissingFields(Vec<&'static str>),
    NoPaymentMethod,
    InvalidInstallments(u8),
    InstallmentsRequireCard,
    UnknownCarrier(String),
    /// Submit attempted outside the review step.
    NotReviewing,
    EmptyCart,
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFields(fields) => write!(f, "missing fields: {}", fields.join(", ")),
            Self::NoPaymentMethod => write!(f, "no payment method chosen"),
            Self::InvalidInstallments(n) => {
                write!(f, "installments must be between 1 and {MAX_INSTALLMENTS}, got {n}")
            }
            Self::InstallmentsRequireCard => write!(f, "installments are only available for credit card"),
            Self::UnknownCarrier(id) => write!(f, "unknown carrier: {id}"),
            Self::NotReviewing => write!(f, "order can only be submitted from the review step"),
            Self::EmptyCart => write!(f, "cart is empty"),
        }
    }
}

impl std::error::Error for WizardError {}

/// Handle for one in-flight quote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteTicket {
    generation: u64,
    pub postal_code: PostalCode,
}

/// Handle for one in-flight postal lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    generation: u64,
    edit_seq: u64,
    pub postal_code: PostalCode,
}

/// What the shipping panel should show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ShippingState {
    Idle,
    Loading,
    Options { quotes: Vec<ShippingQuote> },
    /// "No delivery options for this address."
    NoOptions,
    /// Quote call failed; `message` is safe to display.
    Failed { message: String },
}

/// Everything the persistence layer needs to record one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrder {
    /// Stable across retries of the same checkout.
    pub checkout_reference: String,
    pub customer: NewCustomer,
    pub items: Vec<NewOrderItem>,
    /// Centavos.
    pub subtotal: u64,
    pub shipping_cost: u64,
    pub shipping_carrier: Option<String>,
    pub shipping_deadline: Option<u32>,
    pub payment: PaymentChoice,
}

impl PlaceOrder {
    pub fn total(&self) -> u64 {
        self.subtotal + self.shipping_cost
    }

    pub fn installment_amount(&self) -> u64 {
        installment_amount(self.total(), self.payment.installments)
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutWizard {
    reference: String,
    step: CheckoutStep,
    contact: ContactDetails,
    address: ShippingAddress,
    payment: Option<PaymentMethod>,
    installments: u8,
    shipping: ShippingState,
    selected_carrier: Option<String>,
    /// Last known shipping cost in centavos for the current destination.
    /// Survives failed quotes; cleared when the destination changes.
    shipping_cost: u64,
    shipping_deadline: Option<u32>,
    quote_generation: u64,
    lookup_generation: u64,
    edit_seq: u64,
    last_edit: HashMap<AddressField, u64>,
}

impl CheckoutWizard {
    /// `reference` identifies this checkout across submit retries.
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            step: CheckoutStep::CollectingAddress,
            contact: ContactDetails::default(),
            address: ShippingAddress::default(),
            payment: None,
            installments: 1,
            shipping: ShippingState::Idle,
            selected_carrier: None,
            shipping_cost: 0,
            shipping_deadline: None,
            quote_generation: 0,
            lookup_generation: 0,
            edit_seq: 0,
            last_edit: HashMap::new(),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn contact(&self) -> &ContactDetails {
        &self.contact
    }

    pub fn address(&self) -> &ShippingAddress {
        &self.address
    }

    pub fn shipping(&self) -> &ShippingState {
        &self.shipping
    }

    pub fn shipping_cost(&self) -> u64 {
        self.shipping_cost
    }

    pub fn selected_quote(&self) -> Option<&ShippingQuote> {
        let id = self.selected_carrier.as_deref()?;
        match &self.shipping {
            ShippingState::Options { quotes } => quotes.iter().find(|q| q.carrier_id == id),
            _ => None,
        }
    }

    pub fn payment(&self) -> Option<PaymentChoice> {
        self.payment.map(|method| PaymentChoice {
            method,
            installments: self.installments,
        })
    }

    /// Fill contact and address from a signed-in customer's saved record.
    /// Returns true when the saved postal code is complete, i.e. a quote can
    /// be fetched right away.
    pub fn prefill(&mut self, customer: &Customer) -> bool {
        self.contact = ContactDetails {
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
        };
        self.address = ShippingAddress {
            postal_code: customer.postal_code.clone(),
            region: customer.region.clone(),
            city: customer.city.clone(),
            street: customer.street.clone(),
            number: customer.number.clone(),
            complement: customer.complement.clone(),
        };
        self.invalidate_requests();
        self.forget_destination();
        self.address.normalized_postal_code().is_some()
    }

    pub fn set_contact_field(&mut self, field: ContactField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ContactField::Name => self.contact.name = value,
            ContactField::Email => self.contact.email = value,
            ContactField::Phone => self.contact.phone = value,
        }
    }

    /// Manual edit of an address field. Edits made after a lookup was issued
    /// win over that lookup's result.
    pub fn set_address_field(&mut self, field: AddressField, value: impl Into<String>) {
        if field == AddressField::PostalCode {
            self.set_postal_code(value);
            return;
        }
        self.edit_seq += 1;
        self.last_edit.insert(field, self.edit_seq);
        self.address.set(field, value.into());
    }

    /// Update the postal code field. Returns the normalized code when the
    /// input reached full length, signalling that lookup and quote should run.
    ///
    /// Any change of the normalized value invalidates requests in flight.
    pub fn set_postal_code(&mut self, raw: impl Into<String>) -> Option<PostalCode> {
        let before = self.address.normalized_postal_code();
        self.address.postal_code = raw.into();
        let after = self.address.normalized_postal_code();
        if before != after {
            self.invalidate_requests();
            self.forget_destination();
        }
        after
    }

    /// Quotes and costs belong to one destination.
    fn forget_destination(&mut self) {
        self.selected_carrier = None;
        self.shipping_cost = 0;
        self.shipping_deadline = None;
        if matches!(
            self.shipping,
            ShippingState::Options { .. } | ShippingState::NoOptions
        ) {
            self.shipping = ShippingState::Idle;
        }
    }

    fn invalidate_requests(&mut self) {
        self.quote_generation += 1;
        self.lookup_generation += 1;
        if self.shipping == ShippingState::Loading {
            self.shipping = ShippingState::Idle;
        }
    }

    /// Start a postal lookup for the current code.
    pub fn begin_lookup(&mut self) -> Option<LookupTicket> {
        let postal_code = self.address.normalized_postal_code()?;
        self.lookup_generation += 1;
        Some(LookupTicket {
            generation: self.lookup_generation,
            edit_seq: self.edit_seq,
            postal_code,
        })
    }

    /// Apply a lookup result. Returns false when the ticket is stale.
    pub fn apply_lookup(&mut self, ticket: &LookupTicket, found: Option<PartialAddress>) -> bool {
        if ticket.generation != self.lookup_generation {
            return false;
        }
        let Some(found) = found else {
            return true;
        };
        for (field, value) in [
            (AddressField::Street, found.street),
            (AddressField::City, found.city),
            (AddressField::Region, found.region),
        ] {
            let edited_later = self
                .last_edit
                .get(&field)
                .is_some_and(|&seq| seq > ticket.edit_seq);
            if !edited_later && !value.is_empty() {
                self.address.set(field, value);
            }
        }
        true
    }

    /// Start a quote for the current code; the shipping panel shows loading.
    pub fn begin_quote(&mut self) -> Option<QuoteTicket> {
        let postal_code = self.address.normalized_postal_code()?;
        self.quote_generation += 1;
        self.shipping = ShippingState::Loading;
        self.selected_carrier = None;
        Some(QuoteTicket {
            generation: self.quote_generation,
            postal_code,
        })
    }

    /// Apply a quote result. Returns false when the ticket is stale.
    ///
    /// Options auto-select the cheapest carrier. Failures keep the last known
    /// shipping cost; an answer with no carrier clears it.
    pub fn apply_quote(
        &mut self,
        ticket: &QuoteTicket,
        result: Result<QuoteOutcome, QuoteError>,
    ) -> bool {
        if ticket.generation != self.quote_generation {
            return false;
        }
        match result {
            Ok(QuoteOutcome::Options { quotes }) => {
                if let Some(cheapest) = quotes.first() {
                    self.selected_carrier = Some(cheapest.carrier_id.clone());
                    self.shipping_cost = cheapest.price;
                    self.shipping_deadline = Some(cheapest.deadline_days);
                }
                self.shipping = ShippingState::Options { quotes };
            }
            Ok(QuoteOutcome::NoOptions) => {
                self.selected_carrier = None;
                self.shipping_cost = 0;
                self.shipping_deadline = None;
                self.shipping = ShippingState::NoOptions;
            }
            Err(err) => {
                self.shipping = ShippingState::Failed {
                    message: err.user_message(),
                };
            }
        }
        true
    }

    /// Override the auto-selected carrier.
    pub fn select_quote(&mut self, carrier_id: &str) -> Result<(), WizardError> {
        let ShippingState::Options { quotes } = &self.shipping else {
            return Err(WizardError::UnknownCarrier(carrier_id.to_string()));
        };
        let quote = quotes
            .iter()
            .find(|q| q.carrier_id == carrier_id)
            .ok_or_else(|| WizardError::UnknownCarrier(carrier_id.to_string()))?;
        self.shipping_cost = quote.price;
        self.shipping_deadline = Some(quote.deadline_days);
        self.selected_carrier = Some(quote.carrier_id.clone());
        Ok(())
    }

    pub fn choose_payment(&mut self, method: PaymentMethod) {
        self.payment = Some(method);
        if method == PaymentMethod::Pix {
            self.installments = 1;
        }
    }

    pub fn set_installments(&mut self, installments: u8) -> Result<(), WizardError> {
        if self.payment != Some(PaymentMethod::CreditCard) {
            return Err(WizardError::InstallmentsRequireCard);
        }
        if !(1..=MAX_INSTALLMENTS).contains(&installments) {
            return Err(WizardError::InvalidInstallments(installments));
        }
        self.installments = installments;
        Ok(())
    }

    /// Fields blocking the address step.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = self.contact.missing_fields();
        missing.extend(self.address.missing_fields());
        missing
    }

    /// Move one step forward. Never skips a step.
    pub fn advance(&mut self) -> Result<CheckoutStep, WizardError> {
        self.step = match self.step {
            CheckoutStep::CollectingAddress => {
                let missing = self.missing_fields();
                if !missing.is_empty() {
                    return Err(WizardError::MissingFields(missing));
                }
                CheckoutStep::ChoosingPayment
            }
            CheckoutStep::ChoosingPayment => {
                if self.payment.is_none() {
                    return Err(WizardError::NoPaymentMethod);
                }
                CheckoutStep::ReviewingOrder
            }
            CheckoutStep::ReviewingOrder => return Err(WizardError::NotReviewing),
        };
        Ok(self.step)
    }

    /// Move one step back. Always allowed; keeps every field.
    pub fn back(&mut self) -> CheckoutStep {
        self.step = match self.step {
            CheckoutStep::CollectingAddress | CheckoutStep::ChoosingPayment => {
                CheckoutStep::CollectingAddress
            }
            CheckoutStep::ReviewingOrder => CheckoutStep::ChoosingPayment,
        };
        self.step
    }

    /// Subtotal plus the currently selected shipping cost.
    pub fn total(&self, cart: &Cart) -> u64 {
        cart.subtotal() + self.shipping_cost
    }

    /// `(count, "Nx de R$ ...")` for every allowed installment count.
    pub fn installment_options(&self, cart: &Cart) -> Vec<(u8, String)> {
        let total = self.total(cart);
        (1..=MAX_INSTALLMENTS)
            .map(|n| (n, format_installment(total, n)))
            .collect()
    }

    /// Build the order to persist. Only valid from the review step.
    pub fn submission(&self, cart: &Cart) -> Result<PlaceOrder, WizardError> {
        if self.step != CheckoutStep::ReviewingOrder {
            return Err(WizardError::NotReviewing);
        }
        if cart.is_empty() {
            return Err(WizardError::EmptyCart);
        }
        let payment = self.payment().ok_or(WizardError::NoPaymentMethod)?;
        let postal_code = self
            .address
            .normalized_postal_code()
            .ok_or(WizardError::MissingFields(vec!["postal_code"]))?;

        let a = &self.address;
        Ok(PlaceOrder {
            checkout_reference: self.reference.clone(),
            customer: NewCustomer {
                name: self.contact.name.trim().to_string(),
                email: self.contact.email.trim().to_lowercase(),
                phone: self.contact.phone.trim().to_string(),
                street: a.street.trim().to_string(),
                number: a.number.trim().to_string(),
                complement: a.complement.trim().to_string(),
                postal_code: postal_code.digits().to_string(),
                city: a.city.trim().to_string(),
                region: a.region.trim().to_uppercase(),
            },
            items: cart
                .lines()
                .iter()
                .map(|line| NewOrderItem {
                    product_id: line.product.id.clone(),
                    quantity: line.quantity,
                    price: line.product.price,
                })
                .collect(),
            subtotal: cart.subtotal(),
            shipping_cost: self.shipping_cost,
            shipping_carrier: self.selected_carrier.clone(),
            shipping_deadline: self.selected_carrier.as_ref().and(self.shipping_deadline),
            payment,
        })
    }
}
