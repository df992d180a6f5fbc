use sqlx::SqlitePool;

/// The engine schema. Executed statement by statement on startup; every statement is idempotent, so a restart
/// against an existing store is a no-op.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id TEXT NOT NULL UNIQUE,
        customer_id TEXT NOT NULL,
        currency TEXT NOT NULL DEFAULT 'USD',
        subtotal INTEGER NOT NULL DEFAULT 0,
        discount INTEGER NOT NULL DEFAULT 0,
        tax INTEGER NOT NULL DEFAULT 0,
        shipping INTEGER NOT NULL DEFAULT 0,
        total INTEGER NOT NULL,
        payment_method TEXT NOT NULL,
        payment_status TEXT NOT NULL DEFAULT 'pending',
        transaction_id TEXT,
        paid_at DATETIME,
        gateway_payload TEXT,
        fulfilment_status TEXT NOT NULL DEFAULT 'pending_payment',
        shipping_address TEXT,
        billing_address TEXT,
        contact_email TEXT,
        last_synced_hash TEXT,
        gateway_account_id INTEGER REFERENCES gateway_accounts (id),
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (payment_status, payment_method)",
    r#"CREATE TABLE IF NOT EXISTS order_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_row_id INTEGER NOT NULL REFERENCES orders (id),
        product_id TEXT NOT NULL,
        denomination INTEGER NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price INTEGER NOT NULL,
        total INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_order_items_stock_key ON order_items (product_id, denomination)",
    r#"CREATE TABLE IF NOT EXISTS product_stock (
        product_id TEXT NOT NULL,
        denomination INTEGER NOT NULL,
        total INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (product_id, denomination)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS product_holds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id TEXT NOT NULL,
        denomination INTEGER NOT NULL,
        quantity INTEGER NOT NULL,
        cart_key TEXT NOT NULL,
        expires_at DATETIME NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_product_holds_stock_key ON product_holds (product_id, denomination)",
    "CREATE INDEX IF NOT EXISTS idx_product_holds_cart ON product_holds (cart_key)",
    r#"CREATE TABLE IF NOT EXISTS initiation_latches (
        order_id TEXT NOT NULL,
        payment_method TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (order_id, payment_method)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS gateway_accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        brand TEXT NOT NULL,
        label TEXT NOT NULL,
        wallet_address TEXT NOT NULL,
        enabled BOOLEAN NOT NULL DEFAULT 1,
        is_default BOOLEAN NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (brand, wallet_address)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS affiliate_accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        gateway_account_id INTEGER NOT NULL UNIQUE REFERENCES gateway_accounts (id),
        payout_wallet TEXT NOT NULL,
        commission_rate REAL NOT NULL,
        merchant_rate REAL NOT NULL,
        enabled BOOLEAN NOT NULL DEFAULT 1,
        total_transactions INTEGER NOT NULL DEFAULT 0,
        total_commission INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
];

pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
