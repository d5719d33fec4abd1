//! `namecheap.users.address.*` commands.

use crate::client::ApiClient;
use crate::error::{ExpensiveError, ExpensiveResult};
use crate::models::{AddressDetail, AddressSummary};

const GET_LIST: &str = "namecheap.users.address.getList";
const GET_INFO: &str = "namecheap.users.address.getInfo";

/// Saved addresses of the account.
pub async fn get_list(client: &ApiClient) -> ExpensiveResult<Vec<AddressSummary>> {
    let root = client.query(GET_LIST, Vec::<(String, String)>::new()).await?;
    let list = root.require("AddressGetListResult")?;
    Ok(list
        .extract("List")
        .into_iter()
        .map(AddressSummary::from_node)
        .collect())
}

/// Full contact record of address `id`. Every field tag must be present.
pub async fn get_info(client: &ApiClient, id: &str) -> ExpensiveResult<AddressDetail> {
    let root = client.query(GET_INFO, [("AddressId", id)]).await?;
    let result = root.require("GetAddressInfoResult")?;
    AddressDetail::from_node(result)
}

/// Id of the address flagged as default.
pub fn find_default(addresses: &[AddressSummary]) -> Option<&str> {
    addresses
        .iter()
        .find(|a| a.is_default)
        .map(|a| a.id.as_str())
}

/// Look up the default address and fetch its details.
pub async fn get_default(client: &ApiClient) -> ExpensiveResult<AddressDetail> {
    let addresses = get_list(client).await?;
    let id = find_default(&addresses).ok_or(ExpensiveError::NoDefaultAddress)?;
    tracing::debug!(address_id = id, "Using default address");
    get_info(client, id).await
}
