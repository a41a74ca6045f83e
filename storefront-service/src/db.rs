use sqlx::PgPool;

/// Idempotent schema bootstrap, executed one statement at a time (Postgres
/// prepared statements reject multi-command strings).
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
      id uuid PRIMARY KEY,
      email text NOT NULL,
      full_name text NULL,
      phone text NULL,
      role text NOT NULL DEFAULT 'customer',
      created_at timestamptz NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS spare_parts (
      id uuid PRIMARY KEY,
      name text NOT NULL,
      description text NULL,
      car_model text NULL,
      price_cents bigint NOT NULL,
      stock_quantity int NOT NULL DEFAULT 0 CHECK (stock_quantity >= 0),
      image_url text NULL,
      created_at timestamptz NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
      id uuid PRIMARY KEY,
      user_id uuid NULL,
      customer_name text NULL,
      customer_phone text NULL,
      total_amount_cents bigint NOT NULL,
      payment_status text NOT NULL,
      order_status text NOT NULL,
      payment_method text NOT NULL,
      gateway_intent_id text NULL,
      gateway_payment_id text NULL,
      invoice_url text NULL,
      gst_cents bigint NOT NULL DEFAULT 0,
      discount_cents bigint NOT NULL DEFAULT 0,
      created_at timestamptz NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
      id uuid PRIMARY KEY,
      order_id uuid NOT NULL,
      spare_part_id uuid NOT NULL,
      quantity int NOT NULL,
      unit_price_cents bigint NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS khatabook (
      id uuid PRIMARY KEY,
      customer_id uuid NOT NULL,
      order_id uuid NOT NULL,
      total_amount_cents bigint NOT NULL,
      paid_amount_cents bigint NOT NULL DEFAULT 0,
      pending_amount_cents bigint NOT NULL,
      due_date timestamptz NOT NULL,
      status text NOT NULL DEFAULT 'pending',
      created_at timestamptz NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ads (
      id uuid PRIMARY KEY,
      title text NOT NULL,
      image_url text NOT NULL,
      redirect_url text NULL,
      active boolean NOT NULL DEFAULT true,
      created_at timestamptz NOT NULL DEFAULT now()
    )
    "#,
];
