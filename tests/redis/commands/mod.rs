mod echo;
mod ping;
mod replconf;
