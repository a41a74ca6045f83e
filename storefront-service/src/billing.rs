use common_money::Money;
use serde::Serialize;
use uuid::Uuid;

/// GST applied to the discounted subtotal of every bill.
pub const GST_RATE_BPS: i64 = 1_800;

/// One line of an in-progress bill. The unit price is a snapshot taken when
/// the line entered the cart and must not follow later catalog changes.
#[derive(Debug, Clone)]
pub struct BillLine {
    pub spare_part_id: Uuid,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i32,
}

impl BillLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BillTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub gst: Money,
    pub grand_total: Money,
}

/// Recomputes bill totals from scratch. The discount is clamped into
/// `[0, subtotal]` so the taxable base can never go negative; GST is taken
/// on the discounted subtotal. Safe to call on every cart mutation.
pub fn compute(lines: &[BillLine], discount: Money, rate_bps: i64) -> BillTotals {
    let subtotal: Money = lines.iter().map(|line| line.line_total()).sum();
    let discount = discount.clamp(Money::zero(), subtotal);
    let taxable = subtotal - discount;
    let gst = taxable.percent_bps(rate_bps);
    BillTotals { subtotal, discount, gst, grand_total: taxable + gst }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    Upi,
    Cod,
    Credit,
    Gateway,
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "upi" => Some(PaymentMethod::Upi),
            "cod" => Some(PaymentMethod::Cod),
            "credit" => Some(PaymentMethod::Credit),
            "gateway" => Some(PaymentMethod::Gateway),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Cod => "cod",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Gateway => "gateway",
        }
    }

    /// Payment state decided synchronously at commit time. Gateway bills
    /// only ever commit after signature verification, hence `paid`.
    pub fn initial_payment_status(&self) -> &'static str {
        match self {
            PaymentMethod::Cash | PaymentMethod::Upi | PaymentMethod::Gateway => "paid",
            PaymentMethod::Cod | PaymentMethod::Credit => "pending",
        }
    }
}
