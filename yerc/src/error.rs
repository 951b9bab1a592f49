use std::io;

/// Errors produced by the codec, the client and the RPC server.
#[derive( Debug, thiserror::Error )]
pub enum Error {
  /// A received datagram violated a header or payload invariant.
  #[error( "malformed response: {0}" )]
  MalformedResponse( String ),

  /// The controller reported a non-zero command status.
  #[error( "command failed with status 0x{status:02X} and additional status 0x{extra_status:04X}" )]
  CommandFailed { status: u8, extra_status: u16 },

  /// A response arrived for a request id with no in-flight entry.
  #[error( "response for unknown request id {0}" )]
  UnknownRequest( u8 ),

  /// The deadline expired before the response completed.
  #[error( "command timed out" )]
  Timeout,

  /// The transport was closed while the request was in flight.
  #[error( "request cancelled" )]
  Cancelled,

  /// A lower-level I/O failure on the datagram socket.
  #[error( "transport error: {0}" )]
  Transport( #[from] io::Error ),

  /// All 256 request ids are outstanding on the same transport.
  #[error( "too many requests in flight" )]
  TooManyInFlight,

  /// The caller supplied an argument the protocol cannot express.
  #[error( "invalid argument: {0}" )]
  InvalidArgument( String ),

  /// A lower layer's error annotated with the operation that hit it.
  #[error( "{context}: {source}" )]
  Context {
    context: String,
    #[source]
    source: Box<Error>
  }
}

/// The kinds of <Error>, independent of any context prefixes.
#[derive( Clone, Copy, Debug, PartialEq, Eq )]
pub enum ErrorKind {
  MalformedResponse,
  CommandFailed,
  UnknownRequest,
  Timeout,
  Cancelled,
  Transport,
  TooManyInFlight,
  InvalidArgument
}

impl Error {
  /// Prefixes the error description with `context`. The kind is preserved.
  pub fn context( self, context: impl Into<String> ) -> Error {
    Error::Context{ context: context.into(), source: Box::new( self ) }
  }

  /// Returns the kind of this error, looking through context wrappers.
  pub fn kind( &self ) -> ErrorKind {
    match self {
      Error::MalformedResponse( _ ) => ErrorKind::MalformedResponse,
      Error::CommandFailed{ .. } => ErrorKind::CommandFailed,
      Error::UnknownRequest( _ ) => ErrorKind::UnknownRequest,
      Error::Timeout => ErrorKind::Timeout,
      Error::Cancelled => ErrorKind::Cancelled,
      Error::Transport( _ ) => ErrorKind::Transport,
      Error::TooManyInFlight => ErrorKind::TooManyInFlight,
      Error::InvalidArgument( _ ) => ErrorKind::InvalidArgument,
      Error::Context{ source, .. } => source.kind()
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn context_prefixes_the_description_and_preserves_the_kind() {
    let error = Error::Timeout
      .context( "reading commands status variables" )
      .context( "polling" );

    assert_eq!( error.kind(), ErrorKind::Timeout );
    assert_eq!( error.to_string(), "polling: reading commands status variables: command timed out" );
  }

  #[test]
  fn command_failures_render_both_status_words() {
    let error = Error::CommandFailed{ status: 0x1F, extra_status: 0x0002 };
    assert_eq!( error.to_string(), "command failed with status 0x1F and additional status 0x0002" );
  }
}
