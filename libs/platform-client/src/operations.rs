//! Declared platform operations.
//!
//! Each operation is a zero-sized type implementing [`Operation`]; the
//! `declare_operations!` table also generates the typed
//! [`Client`](crate::Client) method that dispatches it through
//! [`Client::call`](crate::Client::call).

use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::{
    CreateMessageInput, CreateMessageResponse, DeleteFileInput, DeleteFileResponse,
    GetAccountInput, GetAccountResponse, GetBotInput, GetBotResponse, GetConversationInput,
    GetConversationResponse, GetFileInput, GetFileResponse, GetUserInput, GetUserResponse,
    ListBotsInput, ListBotsResponse, ListFilesInput, ListFilesResponse,
};

/// One remote call with a fixed input and output contract.
///
/// `GET` and `DELETE` operations send their input as a query string; every
/// other method sends it as a JSON body.
pub trait Operation {
    /// Operation name as declared by the platform.
    const NAME: &'static str;
    const METHOD: Method;

    type Input: Serialize + Send + Sync;
    type Output: DeserializeOwned + Send;

    /// Request path, starting with `/`, with path parameters filled in.
    fn path(input: &Self::Input) -> String;
}

/// Percent-encode `value` as one path segment.
///
/// `.` and `..` are escaped as well so they stay literal ids.
pub(crate) fn path_segment(value: &str) -> String {
    match value {
        "." => "%2E".to_owned(),
        ".." => "%2E%2E".to_owned(),
        _ => urlencoding::encode(value).into_owned(),
    }
}

/// Declare operations and their `Client` wrappers.
///
/// Each entry reads `Type => method: HTTP_METHOD "name" (Input) -> Output,`
/// followed by a closure-like path builder.
macro_rules! declare_operations {
    ($(
        $(#[$meta:meta])*
        $op:ident => $fn_name:ident : $method:ident $name:literal ($input:ty) -> $output:ty,
            |$arg:pat_param| $path:expr;
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $op;

            impl $crate::operations::Operation for $op {
                const NAME: &'static str = $name;
                const METHOD: ::http::Method = ::http::Method::$method;

                type Input = $input;
                type Output = $output;

                fn path($arg: &Self::Input) -> String {
                    $path
                }
            }

            impl $crate::Client {
                $(#[$meta])*
                ///
                /// # Errors
                ///
                /// Returns a [`ClientError`](crate::ClientError) for API error
                /// payloads and for transport failures.
                pub async fn $fn_name(&self, input: &$input) -> Result<$output, $crate::ClientError> {
                    self.call::<$op>(input).await
                }
            }
        )*
    };
}

declare_operations! {
    /// Fetch the account that owns the configured token.
    GetAccount => get_account: GET "getAccount" (GetAccountInput) -> GetAccountResponse,
        |_| "/v1/admin/account/me".to_owned();

    /// Fetch a bot by id.
    GetBot => get_bot: GET "getBot" (GetBotInput) -> GetBotResponse,
        |input| format!("/v1/admin/bots/{}", path_segment(&input.id));

    /// List bots of the configured workspace.
    ListBots => list_bots: GET "listBots" (ListBotsInput) -> ListBotsResponse,
        |_| "/v1/admin/bots".to_owned();

    /// Fetch file metadata by id.
    GetFile => get_file: GET "getFile" (GetFileInput) -> GetFileResponse,
        |input| format!("/v1/files/{}", path_segment(&input.id));

    /// List files of the configured bot.
    ListFiles => list_files: GET "listFiles" (ListFilesInput) -> ListFilesResponse,
        |_| "/v1/files".to_owned();

    /// Delete a file by id.
    DeleteFile => delete_file: DELETE "deleteFile" (DeleteFileInput) -> DeleteFileResponse,
        |input| format!("/v1/files/{}", path_segment(&input.id));

    /// Fetch a conversation by id.
    GetConversation => get_conversation: GET "getConversation" (GetConversationInput) -> GetConversationResponse,
        |input| format!("/v1/chat/conversations/{}", path_segment(&input.id));

    /// Post a message to a conversation.
    CreateMessage => create_message: POST "createMessage" (CreateMessageInput) -> CreateMessageResponse,
        |_| "/v1/chat/messages".to_owned();

    /// Fetch a user by id.
    GetUser => get_user: GET "getUser" (GetUserInput) -> GetUserResponse,
        |input| format!("/v1/chat/users/{}", path_segment(&input.id));
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn paths_fill_parameters() {
        let input = GetBotInput {
            id: "bot_1".to_owned(),
        };
        assert_eq!(GetBot::path(&input), "/v1/admin/bots/bot_1");
        assert_eq!(GetAccount::path(&GetAccountInput), "/v1/admin/account/me");
    }

    #[test]
    fn path_parameters_are_single_encoded_segments() {
        let id = |id: &str| GetFileInput { id: id.to_owned() };

        assert_eq!(
            GetFile::path(&id("../admin/bots?x=1")),
            "/v1/files/..%2Fadmin%2Fbots%3Fx%3D1"
        );
        assert_eq!(GetFile::path(&id("my file")), "/v1/files/my%20file");
        assert_eq!(GetFile::path(&id("..")), "/v1/files/%2E%2E");
        assert_eq!(GetFile::path(&id("file_1-a.txt")), "/v1/files/file_1-a.txt");
    }

    #[test]
    fn table_declares_names_and_methods() {
        assert_eq!(GetBot::NAME, "getBot");
        assert_eq!(DeleteFile::METHOD, Method::DELETE);
        assert_eq!(CreateMessage::METHOD, Method::POST);
        assert_eq!(ListFiles::METHOD, Method::GET);
    }

    #[test]
    fn path_parameters_stay_out_of_query() {
        let input = GetFileInput {
            id: "file_1".to_owned(),
        };
        assert_eq!(serde_urlencoded::to_string(&input).unwrap(), "");

        let input = ListFilesInput {
            next_token: Some("abc".to_owned()),
            sort_field: None,
        };
        assert_eq!(serde_urlencoded::to_string(&input).unwrap(), "nextToken=abc");
    }
}
