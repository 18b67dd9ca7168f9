mod evaluate;
mod provider;
