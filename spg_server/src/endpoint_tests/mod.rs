mod admin;
mod callbacks;
mod checkout;
mod helpers;
mod holds;
mod mocks;
